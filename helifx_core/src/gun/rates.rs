//! Rate-of-fire selection.

use helifx_common::config::ConfigError;
use helifx_common::fx::config::{RateOfFireEntry, validate_rates};

/// Rates of fire ordered by ascending trigger threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateTable {
    entries: Vec<RateOfFireEntry>,
}

impl RateTable {
    /// Validate and sort `entries`.
    ///
    /// An empty table is valid and never selects a rate.
    pub fn new(mut entries: Vec<RateOfFireEntry>) -> Result<Self, ConfigError> {
        validate_rates(&entries)?;
        entries.sort_by_key(|e| e.pwm_threshold_us);
        Ok(Self { entries })
    }

    /// Index of the rate with the largest threshold `<= pwm_us`.
    ///
    /// `None` below the lowest threshold (trigger released).
    pub fn select(&self, pwm_us: i32) -> Option<usize> {
        self.entries
            .partition_point(|e| e.pwm_threshold_us <= pwm_us)
            .checked_sub(1)
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&RateOfFireEntry> {
        self.entries.get(index)
    }

    /// Number of rates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if firing is disabled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rates in ascending threshold order.
    pub fn iter(&self) -> impl Iterator<Item = &RateOfFireEntry> {
        self.entries.iter()
    }
}
