//! FX configuration types.
//!
//! This module contains the configuration tree for the HeliFX daemon:
//! - `HeliFxConfig` - Main configuration loaded from helifx.toml
//! - `GunFxConfig` - Trigger, smoke, nozzle flash, turret servos, rates of fire
//! - `ServoAxisConfig` - Per-axis mapping and motion limits
//! - `RateOfFireEntry` - One named firing speed

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_AVG_WINDOW_MS, DEFAULT_FAN_OFF_DELAY_MS, DEFAULT_GPIO_CHIP,
    DEFAULT_HEATER_THRESHOLD_US, DEFAULT_SERVO_RATE_HZ, MAX_GPIO_PIN, is_reserved_pin,
};
use crate::fx::types::PinId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

fn default_servo_rate_hz() -> u32 {
    DEFAULT_SERVO_RATE_HZ
}

fn default_avg_window_ms() -> u32 {
    DEFAULT_AVG_WINDOW_MS
}

fn default_fan_off_delay_ms() -> u32 {
    DEFAULT_FAN_OFF_DELAY_MS
}

fn default_heater_threshold_us() -> i32 {
    DEFAULT_HEATER_THRESHOLD_US
}

fn default_gpio_chip() -> PathBuf {
    PathBuf::from(DEFAULT_GPIO_CHIP)
}

fn default_output_driver() -> String {
    "simulation".to_string()
}

fn default_true() -> bool {
    true
}

/// Main configuration loaded from `helifx.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeliFxConfig {
    /// Logging and instance naming.
    #[serde(default)]
    pub shared: SharedConfig,

    /// GPIO chip and output transport selection.
    #[serde(default)]
    pub gpio: GpioConfig,

    /// Gun effects.
    #[serde(default)]
    pub gun: GunFxConfig,
}

impl HeliFxConfig {
    /// Validate the whole tree.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.gun.enabled {
            self.gun.validate()?;
        }
        Ok(())
    }
}

/// Hardware access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    /// GPIO character device used for edge capture.
    #[serde(default = "default_gpio_chip")]
    pub chip_path: PathBuf,

    /// Output driver name ("simulation" or "gpio").
    #[serde(default = "default_output_driver")]
    pub output_driver: String,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip_path: default_gpio_chip(),
            output_driver: default_output_driver(),
        }
    }
}

/// Mapping and motion limits of one servo axis.
///
/// `max_speed_us_per_s == 0` or `max_accel_us_per_s2 == 0` disables the
/// corresponding limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoAxisConfig {
    /// Lowest input pulse [µs]
    pub input_min_us: i32,
    /// Highest input pulse [µs]
    pub input_max_us: i32,
    /// Lowest output pulse [µs]
    pub output_min_us: i32,
    /// Highest output pulse [µs]
    pub output_max_us: i32,
    /// Speed limit [µs/s], 0 = unlimited
    #[serde(default)]
    pub max_speed_us_per_s: f32,
    /// Acceleration limit [µs/s²], 0 = unlimited
    #[serde(default)]
    pub max_accel_us_per_s2: f32,
    /// Control loop rate [Hz]
    #[serde(default = "default_servo_rate_hz")]
    pub update_rate_hz: u32,
}

impl Default for ServoAxisConfig {
    fn default() -> Self {
        Self {
            input_min_us: 1000,
            input_max_us: 2000,
            output_min_us: 1000,
            output_max_us: 2000,
            max_speed_us_per_s: 0.0,
            max_accel_us_per_s2: 0.0,
            update_rate_hz: DEFAULT_SERVO_RATE_HZ,
        }
    }
}

impl ServoAxisConfig {
    /// Validate ranges and limits.
    ///
    /// # Validation Rules
    /// 1. `input_min_us < input_max_us`
    /// 2. `output_min_us < output_max_us`
    /// 3. speed and acceleration finite and >= 0
    /// 4. `update_rate_hz` in 1..=1000
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_min_us >= self.input_max_us {
            return Err(ConfigError::InvalidRange {
                field: "input",
                min: self.input_min_us.into(),
                max: self.input_max_us.into(),
            });
        }
        if self.output_min_us >= self.output_max_us {
            return Err(ConfigError::InvalidRange {
                field: "output",
                min: self.output_min_us.into(),
                max: self.output_max_us.into(),
            });
        }
        if !self.max_speed_us_per_s.is_finite() || self.max_speed_us_per_s < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "max_speed_us_per_s must be >= 0 (got {})",
                self.max_speed_us_per_s
            )));
        }
        if !self.max_accel_us_per_s2.is_finite() || self.max_accel_us_per_s2 < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "max_accel_us_per_s2 must be >= 0 (got {})",
                self.max_accel_us_per_s2
            )));
        }
        if self.update_rate_hz == 0 || self.update_rate_hz > 1000 {
            return Err(ConfigError::ValidationError(format!(
                "update_rate_hz must be in 1..=1000 (got {})",
                self.update_rate_hz
            )));
        }
        Ok(())
    }

    /// Map an input pulse onto the output range, clamped to both ranges.
    pub fn map_input(&self, input_us: i32) -> i32 {
        let input = input_us.clamp(self.input_min_us, self.input_max_us);
        let in_span = i64::from(self.input_max_us - self.input_min_us);
        let out_span = i64::from(self.output_max_us - self.output_min_us);
        if in_span == 0 {
            return self.output_midpoint();
        }
        let offset = i64::from(input - self.input_min_us) * out_span / in_span;
        (i64::from(self.output_min_us) + offset) as i32
    }

    /// Centre of the output range.
    pub fn output_midpoint(&self) -> i32 {
        self.output_min_us + (self.output_max_us - self.output_min_us) / 2
    }
}

/// One turret servo: where its set-point comes from and where its output goes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServoChannelConfig {
    /// Whether the axis is driven at all.
    #[serde(default)]
    pub enabled: bool,

    /// Receiver channel providing the set-point.
    #[serde(default)]
    pub input_pin: Option<PinId>,

    /// Hardware PWM channel (0-3) for the output pulse (gpio driver only).
    #[serde(default)]
    pub pwm_channel: Option<u32>,

    /// Mapping and motion limits.
    #[serde(flatten)]
    pub axis: ServoAxisConfig,
}

/// One named firing speed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOfFireEntry {
    /// Display name
    pub name: String,
    /// Rounds per minute (> 0)
    pub rpm: u32,
    /// Trigger pulse at or above which this rate is selected [µs]
    pub pwm_threshold_us: i32,
    /// Sound clip handed to the audio player with the firing events
    #[serde(default)]
    pub sound: Option<String>,
}

impl RateOfFireEntry {
    /// Create an entry.
    pub fn new(name: impl Into<String>, rpm: u32, pwm_threshold_us: i32) -> Self {
        Self {
            name: name.into(),
            rpm,
            pwm_threshold_us,
            sound: None,
        }
    }

    /// Time between shots [ms], `60000 / rpm`.
    pub fn shot_interval_ms(&self) -> u32 {
        60_000 / self.rpm.max(1)
    }
}

/// Smoke generator wiring and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeConfig {
    /// Whether smoke is driven.
    #[serde(default)]
    pub enabled: bool,
    /// Fan output line.
    #[serde(default)]
    pub fan_pin: Option<PinId>,
    /// Heater output line.
    #[serde(default)]
    pub heater_pin: Option<PinId>,
    /// Receiver channel toggling the heater.
    #[serde(default)]
    pub heater_toggle_pin: Option<PinId>,
    /// Heater on when the toggle pulse is at or above this [µs].
    #[serde(default = "default_heater_threshold_us")]
    pub heater_pwm_threshold_us: i32,
    /// Fan run-on after firing stops [ms].
    #[serde(default = "default_fan_off_delay_ms")]
    pub fan_off_delay_ms: u32,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fan_pin: None,
            heater_pin: None,
            heater_toggle_pin: None,
            heater_pwm_threshold_us: DEFAULT_HEATER_THRESHOLD_US,
            fan_off_delay_ms: DEFAULT_FAN_OFF_DELAY_MS,
        }
    }
}

/// Nozzle flash LED.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NozzleFlashConfig {
    /// Whether the flash is driven.
    #[serde(default)]
    pub enabled: bool,
    /// Output line.
    #[serde(default)]
    pub pin: Option<PinId>,
}

/// Gun effects configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GunFxConfig {
    /// Whether the gun controller runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Receiver channel carrying the trigger.
    #[serde(default)]
    pub trigger_pin: Option<PinId>,

    /// Trigger averaging window [ms].
    #[serde(default = "default_avg_window_ms")]
    pub avg_window_ms: u32,

    /// Pitch kick applied during the first half of each shot while firing [µs].
    #[serde(default)]
    pub recoil_offset_us: i32,

    /// Nozzle flash output.
    #[serde(default)]
    pub nozzle_flash: NozzleFlashConfig,

    /// Smoke generator.
    #[serde(default)]
    pub smoke: SmokeConfig,

    /// Elevation servo.
    #[serde(default)]
    pub pitch_servo: ServoChannelConfig,

    /// Traverse servo.
    #[serde(default)]
    pub yaw_servo: ServoChannelConfig,

    /// Rates of fire; empty disables the trigger.
    #[serde(default)]
    pub rates: Vec<RateOfFireEntry>,
}

impl Default for GunFxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_pin: None,
            avg_window_ms: DEFAULT_AVG_WINDOW_MS,
            recoil_offset_us: 0,
            nozzle_flash: NozzleFlashConfig::default(),
            smoke: SmokeConfig::default(),
            pitch_servo: ServoChannelConfig::default(),
            yaw_servo: ServoChannelConfig::default(),
            rates: Vec::new(),
        }
    }
}

impl GunFxConfig {
    /// Validate the gun configuration.
    ///
    /// # Validation Rules
    /// 1. every rate has `rpm > 0` and a unique threshold
    /// 2. enabled servos have valid axis configs
    /// 3. every used pin is in range, not reserved, and used once
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rates(&self.rates)?;

        for (name, servo) in [("pitch_servo", &self.pitch_servo), ("yaw_servo", &self.yaw_servo)] {
            if servo.enabled {
                servo.axis.validate().map_err(|e| match e {
                    ConfigError::ValidationError(msg) => {
                        ConfigError::ValidationError(format!("{name}: {msg}"))
                    }
                    other => other,
                })?;
            }
        }

        let mut used = HashSet::new();
        for (what, pin) in self.used_pins() {
            check_pin(what, pin)?;
            if !used.insert(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "GPIO {pin} assigned more than once ({what})"
                )));
            }
        }
        Ok(())
    }

    /// Every GPIO line the enabled features need, labelled.
    pub fn used_pins(&self) -> Vec<(&'static str, PinId)> {
        let mut pins = Vec::new();
        if let Some(pin) = self.trigger_pin {
            pins.push(("trigger", pin));
        }
        if self.nozzle_flash.enabled {
            if let Some(pin) = self.nozzle_flash.pin {
                pins.push(("nozzle_flash", pin));
            }
        }
        if self.smoke.enabled {
            let smoke = &self.smoke;
            for (what, pin) in [
                ("smoke_fan", smoke.fan_pin),
                ("smoke_heater", smoke.heater_pin),
                ("smoke_heater_toggle", smoke.heater_toggle_pin),
            ] {
                if let Some(pin) = pin {
                    pins.push((what, pin));
                }
            }
        }
        for (what, servo) in [("pitch_input", &self.pitch_servo), ("yaw_input", &self.yaw_servo)] {
            if servo.enabled {
                if let Some(pin) = servo.input_pin {
                    pins.push((what, pin));
                }
            }
        }
        pins
    }
}

/// Validate a rates-of-fire table (order does not matter).
pub fn validate_rates(rates: &[RateOfFireEntry]) -> Result<(), ConfigError> {
    let mut thresholds = HashSet::new();
    for rate in rates {
        if rate.rpm == 0 {
            return Err(ConfigError::ValidationError(format!(
                "rate '{}': rpm must be > 0",
                rate.name
            )));
        }
        if !thresholds.insert(rate.pwm_threshold_us) {
            return Err(ConfigError::ValidationError(format!(
                "rate '{}': duplicate pwm_threshold_us {}",
                rate.name, rate.pwm_threshold_us
            )));
        }
    }
    Ok(())
}

fn check_pin(what: &str, pin: PinId) -> Result<(), ConfigError> {
    if pin > MAX_GPIO_PIN {
        return Err(ConfigError::ValidationError(format!(
            "{what}: GPIO {pin} out of range (0-{MAX_GPIO_PIN})"
        )));
    }
    if is_reserved_pin(pin) {
        return Err(ConfigError::ValidationError(format!(
            "{what}: GPIO {pin} is reserved for the audio HAT"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(input: (i32, i32), output: (i32, i32)) -> ServoAxisConfig {
        ServoAxisConfig {
            input_min_us: input.0,
            input_max_us: input.1,
            output_min_us: output.0,
            output_max_us: output.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_axis_validate_ranges() {
        assert!(axis((1000, 2000), (800, 2200)).validate().is_ok());
        assert!(matches!(
            axis((2000, 1000), (800, 2200)).validate(),
            Err(ConfigError::InvalidRange { field: "input", .. })
        ));
        assert!(matches!(
            axis((1000, 2000), (2200, 2200)).validate(),
            Err(ConfigError::InvalidRange { field: "output", .. })
        ));
    }

    #[test]
    fn test_axis_validate_limits() {
        let mut cfg = axis((1000, 2000), (1000, 2000));
        cfg.max_speed_us_per_s = -1.0;
        assert!(cfg.validate().is_err());
        cfg.max_speed_us_per_s = f32::NAN;
        assert!(cfg.validate().is_err());
        cfg.max_speed_us_per_s = 0.0;
        cfg.update_rate_hz = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_map_input_linear_and_clamped() {
        let cfg = axis((1000, 2000), (800, 2200));
        assert_eq!(cfg.map_input(1000), 800);
        assert_eq!(cfg.map_input(1500), 1500);
        assert_eq!(cfg.map_input(2000), 2200);
        assert_eq!(cfg.map_input(500), 800);
        assert_eq!(cfg.map_input(2600), 2200);
        assert_eq!(cfg.output_midpoint(), 1500);
    }

    #[test]
    fn test_shot_interval() {
        assert_eq!(RateOfFireEntry::new("low", 200, 1400).shot_interval_ms(), 300);
        assert_eq!(RateOfFireEntry::new("high", 550, 1700).shot_interval_ms(), 109);
    }

    #[test]
    fn test_rates_validation() {
        assert!(validate_rates(&[]).is_ok());
        assert!(validate_rates(&[RateOfFireEntry::new("zero", 0, 1400)]).is_err());
        assert!(validate_rates(&[
            RateOfFireEntry::new("a", 100, 1400),
            RateOfFireEntry::new("b", 200, 1400),
        ])
        .is_err());
    }

    #[test]
    fn test_gun_rejects_reserved_and_duplicate_pins() {
        let mut gun = GunFxConfig {
            trigger_pin: Some(18),
            ..Default::default()
        };
        assert!(gun.validate().is_err());

        gun.trigger_pin = Some(17);
        gun.smoke = SmokeConfig {
            enabled: true,
            fan_pin: Some(17),
            ..Default::default()
        };
        let err = gun.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));

        gun.smoke.fan_pin = Some(40);
        assert!(gun.validate().is_err());

        gun.smoke.fan_pin = Some(22);
        assert!(gun.validate().is_ok());
    }

    #[test]
    fn test_disabled_features_do_not_claim_pins() {
        let gun = GunFxConfig {
            trigger_pin: Some(17),
            nozzle_flash: NozzleFlashConfig {
                enabled: false,
                pin: Some(17),
            },
            ..Default::default()
        };
        assert!(gun.validate().is_ok());
        assert_eq!(gun.used_pins(), vec![("trigger", 17)]);
    }
}
