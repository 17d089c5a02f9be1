//! Error types for the control core.
//!
//! Only construction and (re)configuration can fail. Noise on the receiver
//! inputs is filtered, never reported.

use helifx_common::config::ConfigError;
use helifx_common::fx::driver::OutputError;
use helifx_common::fx::types::PinId;
use thiserror::Error;

/// Errors from `CaptureRegistry::create`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// Pin is reserved, out of range or already claimed.
    #[error("GPIO {pin} unavailable: {reason}")]
    PinUnavailable {
        /// Requested pin
        pin: PinId,
        /// Why it cannot be used
        reason: String,
    },

    /// The edge-event handle could not be obtained.
    #[error("Edge resource error: {0}")]
    Resource(String),
}

/// Errors from `PwmMonitor::start`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// The active set already holds `max` monitors.
    #[error("Monitor capacity reached ({max} active)")]
    Capacity {
        /// Capacity of the active set
        max: usize,
    },

    /// The shared polling thread could not be spawned.
    #[error("Failed to spawn polling thread: {0}")]
    Thread(String),
}

/// Errors from `ServoProfiler` construction and reconfiguration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServoError {
    /// Axis configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The control loop thread could not be spawned.
    #[error("Failed to spawn servo thread: {0}")]
    Thread(String),
}

/// Top-level runtime error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Monitor creation error
    #[error(transparent)]
    Create(#[from] CreateError),

    /// Monitor start error
    #[error(transparent)]
    Start(#[from] StartError),

    /// Servo error
    #[error(transparent)]
    Servo(#[from] ServoError),

    /// Output driver error
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Signal handler installation failed
    #[error("Signal handler error: {0}")]
    Signal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CreateError::PinUnavailable {
            pin: 18,
            reason: "reserved for audio HAT".to_string(),
        };
        assert_eq!(err.to_string(), "GPIO 18 unavailable: reserved for audio HAT");

        let err = StartError::Capacity { max: 8 };
        assert!(err.to_string().contains('8'));
    }

    #[test]
    fn test_core_error_from() {
        let err: CoreError = StartError::Thread("EAGAIN".to_string()).into();
        assert!(matches!(err, CoreError::Start(StartError::Thread(_))));

        let err: CoreError = ConfigError::FileNotFound.into();
        assert_eq!(err.to_string(), "Configuration file not found");
    }
}
