//! FX data types shared between the control core and its consumers.
//!
//! - `Timestamp` - Monotonic nanosecond instant
//! - `PulseReading` - One accepted receiver pulse
//! - `ServoAxisId` - Gun turret axis selector
//! - `GunStatus` / `GunEvent` - Gun controller observability

use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::time::Duration;

/// BCM GPIO line number.
pub type PinId = u32;

/// Monotonic instant in nanoseconds (CLOCK_MONOTONIC base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Instant zero.
    pub const ZERO: Self = Self(0);

    /// Create from raw nanoseconds.
    #[inline]
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Create from milliseconds.
    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    /// Raw nanoseconds.
    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Signed distance `self - earlier` in nanoseconds.
    #[inline]
    pub const fn nanos_since(self, earlier: Timestamp) -> i64 {
        self.0 as i64 - earlier.0 as i64
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    #[inline]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs.as_nanos() as u64))
    }
}

/// One accepted pulse from a receiver channel.
///
/// `duration_us` is always within `[PULSE_MIN_US, PULSE_MAX_US]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseReading {
    /// Source pin
    pub pin: PinId,
    /// High time of the pulse [µs]
    pub duration_us: i32,
    /// Falling-edge instant
    pub captured_at: Timestamp,
}

/// Turret axis driven by the gun controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServoAxisId {
    /// Elevation
    Pitch,
    /// Traverse
    Yaw,
}

impl ServoAxisId {
    /// Lowercase name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pitch => "pitch",
            Self::Yaw => "yaw",
        }
    }
}

/// Periodic gun status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GunStatus {
    /// Gun is in the firing state
    pub firing: bool,
    /// Selected rate-of-fire index while firing
    pub rate_index: Option<usize>,
    /// Selected rounds per minute while firing
    pub rpm: Option<u32>,
    /// Last averaged trigger pulse [µs]
    pub trigger_pwm_us: Option<i32>,
    /// Smoke heater state
    pub heater_on: bool,
    /// Smoke fan state
    pub fan_on: bool,
    /// Pitch servo output [µs]
    pub pitch_output: Option<i32>,
    /// Yaw servo output [µs]
    pub yaw_output: Option<i32>,
}

/// Side-effect events emitted by the gun controller on state transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GunEvent {
    /// Idle/Stopping → Firing.
    FiringStarted {
        /// Index into the rate table
        rate_index: usize,
        /// Rate name
        name: String,
        /// Rounds per minute
        rpm: u32,
        /// 60000 / rpm
        shot_interval_ms: u32,
        /// Sound clip configured for the rate
        sound: Option<String>,
    },
    /// Firing → Firing with a different rate.
    RateChanged {
        /// Index into the rate table
        rate_index: usize,
        /// Rate name
        name: String,
        /// Rounds per minute
        rpm: u32,
        /// 60000 / rpm
        shot_interval_ms: u32,
        /// Sound clip configured for the rate
        sound: Option<String>,
    },
    /// Firing → Stopping; nozzle flash off.
    FiringStopped,
    /// Smoke fan switched on.
    SmokeFanOn,
    /// Smoke fan switched off.
    SmokeFanOff,
    /// Smoke heater switched on.
    HeaterOn,
    /// Smoke heater switched off.
    HeaterOff,
    /// Periodic status snapshot.
    Status(GunStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_arithmetic() {
        let t0 = Timestamp::from_millis(1000);
        let t1 = t0 + Duration::from_millis(250);
        assert_eq!(t1.as_nanos(), 1_250_000_000);
        assert_eq!(t1.nanos_since(t0), 250_000_000);
        assert_eq!(t0.nanos_since(t1), -250_000_000);
        assert_eq!(t0.saturating_duration_since(t1), Duration::ZERO);
        assert_eq!(t1.saturating_duration_since(t0), Duration::from_millis(250));
    }

    #[test]
    fn gun_event_serializes_with_kind_tag() {
        let json = serde_json::to_string(&GunEvent::SmokeFanOn).unwrap();
        assert_eq!(json, r#"{"kind":"smoke_fan_on"}"#);
    }
}
