//! Runtime gun settings derived from `GunFxConfig`.

use super::rates::RateTable;
use helifx_common::config::ConfigError;
use helifx_common::consts::{DEFAULT_FAN_OFF_DELAY_MS, DEFAULT_HEATER_THRESHOLD_US};
use helifx_common::fx::config::GunFxConfig;
use std::time::Duration;

/// Everything the controller may pick up on reconfiguration.
///
/// Replaced as a whole; see `GunFx::reconfigure`.
#[derive(Debug, Clone, PartialEq)]
pub struct GunSettings {
    /// Rates of fire
    pub rates: RateTable,
    /// Fan run-on after firing stops
    pub fan_off_delay: Duration,
    /// Heater on at or above this toggle pulse [µs]
    pub heater_threshold_us: i32,
    /// Drive the smoke fan and heater
    pub smoke_enabled: bool,
    /// Drive the nozzle flash
    pub flash_enabled: bool,
    /// Pitch kick during the first half of each shot [µs]
    pub recoil_offset_us: i32,
}

impl Default for GunSettings {
    fn default() -> Self {
        Self {
            rates: RateTable::default(),
            fan_off_delay: Duration::from_millis(u64::from(DEFAULT_FAN_OFF_DELAY_MS)),
            heater_threshold_us: DEFAULT_HEATER_THRESHOLD_US,
            smoke_enabled: true,
            flash_enabled: true,
            recoil_offset_us: 0,
        }
    }
}

impl GunSettings {
    /// Build from configuration.
    pub fn from_config(config: &GunFxConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            rates: RateTable::new(config.rates.clone())?,
            fan_off_delay: Duration::from_millis(u64::from(config.smoke.fan_off_delay_ms)),
            heater_threshold_us: config.smoke.heater_pwm_threshold_us,
            smoke_enabled: config.smoke.enabled,
            flash_enabled: config.nozzle_flash.enabled,
            recoil_offset_us: config.recoil_offset_us,
        })
    }
}
