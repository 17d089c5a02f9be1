//! Prelude module for common re-exports.
//!
//! ```rust
//! use helifx_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::fx::config::{
    GpioConfig, GunFxConfig, HeliFxConfig, NozzleFlashConfig, RateOfFireEntry,
    ServoAxisConfig, ServoChannelConfig, SmokeConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_PWM_MONITORS, PULSE_MAX_US, PULSE_MIN_US};

// ─── FX Types ───────────────────────────────────────────────────────
pub use crate::fx::driver::{DriverFactory, OutputDriver, OutputError};
pub use crate::fx::types::{GunEvent, GunStatus, PinId, PulseReading, ServoAxisId, Timestamp};
