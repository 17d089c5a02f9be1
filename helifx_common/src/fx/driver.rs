//! Output driver trait and error types.
//!
//! This module defines:
//! - `OutputDriver` trait - Interface for pluggable output transports
//! - `OutputError` enum - Error types for output operations
//! - `DriverFactory` type alias - Factory function type

use crate::fx::config::HeliFxConfig;
use crate::fx::types::ServoAxisId;
use thiserror::Error;

/// Error types for output operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Writing to the hardware failed
    #[error("Output I/O error: {0}")]
    Io(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn OutputDriver>;

/// Trait defining the interface for output transports.
///
/// The gun controller owns exactly one driver and is its only caller, so
/// implementations need not be `Sync`.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the gun thread starts
/// 2. `set_*()` / `write_servo()` - Called from the gun thread on change
/// 3. `shutdown()` - Called when the gun thread exits; must leave every output off
pub trait OutputDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation", "gpio").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Claim hardware for every enabled output in `config`.
    ///
    /// # Errors
    /// Return `OutputError::InitFailed` if any output cannot be claimed.
    fn init(&mut self, config: &HeliFxConfig) -> Result<(), OutputError>;

    /// Switch the smoke fan.
    fn set_smoke_fan(&mut self, on: bool) -> Result<(), OutputError>;

    /// Switch the smoke heater.
    fn set_smoke_heater(&mut self, on: bool) -> Result<(), OutputError>;

    /// Switch the nozzle flash LED.
    fn set_nozzle_flash(&mut self, on: bool) -> Result<(), OutputError>;

    /// Emit a servo pulse width [µs] on the axis output.
    fn write_servo(&mut self, axis: ServoAxisId, pulse_us: i32) -> Result<(), OutputError>;

    /// Turn every output off and release hardware.
    fn shutdown(&mut self) -> Result<(), OutputError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDriver {
        writes: usize,
    }

    impl OutputDriver for CountingDriver {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn init(&mut self, _config: &HeliFxConfig) -> Result<(), OutputError> {
            Ok(())
        }

        fn set_smoke_fan(&mut self, _on: bool) -> Result<(), OutputError> {
            self.writes += 1;
            Ok(())
        }

        fn set_smoke_heater(&mut self, _on: bool) -> Result<(), OutputError> {
            self.writes += 1;
            Ok(())
        }

        fn set_nozzle_flash(&mut self, _on: bool) -> Result<(), OutputError> {
            self.writes += 1;
            Ok(())
        }

        fn write_servo(&mut self, _axis: ServoAxisId, _pulse_us: i32) -> Result<(), OutputError> {
            Err(OutputError::Io("no servo outputs".to_string()))
        }

        fn shutdown(&mut self) -> Result<(), OutputError> {
            Ok(())
        }
    }

    #[test]
    fn test_output_error_display() {
        let err = OutputError::DriverNotFound("ethercat".to_string());
        assert_eq!(err.to_string(), "Driver not found: ethercat");
    }

    #[test]
    fn test_driver_through_trait_object() {
        let mut driver: Box<dyn OutputDriver> = Box::new(CountingDriver::default());
        driver.init(&HeliFxConfig::default()).unwrap();
        driver.set_smoke_fan(true).unwrap();
        driver.set_nozzle_flash(false).unwrap();
        assert!(driver.write_servo(ServoAxisId::Yaw, 1500).is_err());
        assert_eq!(driver.name(), "counting");
        assert!(!driver.version().is_empty());
    }
}
