//! `helifx.toml` loading.
//!
//! Every table is optional; missing keys take their documented defaults.
//! [`ConfigLoader`] only reads and parses. Semantic checks live in the
//! `validate` methods so the daemon can report all of them before the
//! first GPIO line is claimed.
//!
//! ```rust
//! use helifx_common::config::{ConfigLoader, LogLevel};
//! use helifx_common::fx::config::HeliFxConfig;
//!
//! let config = HeliFxConfig::parse(
//!     r#"
//!     [shared]
//!     log_level = "debug"
//!
//!     [gun]
//!     trigger_pin = 17
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.shared.log_level, LogLevel::Debug);
//! assert_eq!(config.gun.trigger_pin, Some(17));
//! assert_eq!(config.shared.service_name, "helifx");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Why a configuration was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// Unreadable file or invalid TOML.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Pin conflicts, empty rate tables and similar.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// A numeric range is empty or inverted.
    #[error("Invalid range for {field}: min {min} must be < max {max}")]
    InvalidRange {
        /// Name of the offending field pair
        field: &'static str,
        /// Lower bound as given
        min: i64,
        /// Upper bound as given
        max: i64,
    },
}

/// `shared.log_level`; `RUST_LOG` overrides it at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-edge and per-servo-step detail.
    Trace,
    /// Capture thread and driver bookkeeping.
    Debug,
    /// State transitions and periodic status.
    #[default]
    Info,
    /// Dropped pulses, output errors.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_service_name() -> String {
    "helifx".to_string()
}

/// Common configuration fields shared by every HeliFX binary.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "helifx-huey"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Name used in log lines, one per model.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// TOML loading for any deserializable config type, `HeliFxConfig` in
/// particular.
///
/// A missing file is `FileNotFound`; every other read or decode failure is
/// `ParseError`.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::parse(&content)
    }

    /// Parse TOML text, e.g. a config embedded in a test.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed = toml::from_str::<TestWrapper>(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, level);
            assert_eq!(level.as_directive(), text);
        }
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_range_message() {
        let err = ConfigError::InvalidRange {
            field: "input",
            min: 2000,
            max: 1000,
        };
        assert!(err.to_string().contains("input"));
        assert!(err.to_string().contains("2000"));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let result = TestConfig::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_shared_config_defaults() {
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            shared: SharedConfig,
        }

        let config = TestConfig::parse("[shared]\n").unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Info);
        assert_eq!(config.shared.service_name, "helifx");
    }
}
