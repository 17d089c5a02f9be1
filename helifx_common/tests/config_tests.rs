//! helifx.toml loading tests.
//!
//! Full-file parsing, defaults for omitted sections, servo axis flattening,
//! and validation failures surfaced through `HeliFxConfig::validate()`.

use helifx_common::config::{ConfigError, ConfigLoader};
use helifx_common::fx::config::HeliFxConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[shared]
log_level = "debug"
service_name = "helifx-huey"

[gpio]
chip_path = "/dev/gpiochip4"
output_driver = "gpio"

[gun]
trigger_pin = 17
avg_window_ms = 150
recoil_offset_us = 40

[gun.nozzle_flash]
enabled = true
pin = 23

[gun.smoke]
enabled = true
fan_pin = 24
heater_pin = 25
heater_toggle_pin = 22
fan_off_delay_ms = 3000

[gun.pitch_servo]
enabled = true
input_pin = 5
pwm_channel = 0
input_min_us = 1000
input_max_us = 2000
output_min_us = 800
output_max_us = 2200
max_speed_us_per_s = 500.0
max_accel_us_per_s2 = 2000.0

[gun.yaw_servo]
enabled = true
input_pin = 6
pwm_channel = 1
input_min_us = 1000
input_max_us = 2000
output_min_us = 1000
output_max_us = 2000

[[gun.rates]]
name = "low"
rpm = 200
pwm_threshold_us = 1400
sound = "minigun_low.wav"

[[gun.rates]]
name = "high"
rpm = 550
pwm_threshold_us = 1700
"#;

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("helifx.toml");
    fs::write(&path, content).unwrap();
    path
}

// ─── Tests ──────────────────────────────────────────────────────────

/// Test: a complete file loads and validates.
#[test]
fn load_full_config() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);

    let cfg = HeliFxConfig::load(&path).expect("should load");
    cfg.validate().expect("should validate");

    assert_eq!(cfg.shared.service_name, "helifx-huey");
    assert_eq!(cfg.gpio.output_driver, "gpio");
    assert_eq!(cfg.gpio.chip_path, Path::new("/dev/gpiochip4"));
    assert_eq!(cfg.gun.trigger_pin, Some(17));
    assert_eq!(cfg.gun.avg_window_ms, 150);
    assert_eq!(cfg.gun.smoke.fan_off_delay_ms, 3000);
    assert_eq!(cfg.gun.smoke.heater_pwm_threshold_us, 1500);
    assert_eq!(cfg.gun.rates.len(), 2);
    assert_eq!(cfg.gun.rates[0].sound.as_deref(), Some("minigun_low.wav"));
    assert_eq!(cfg.gun.rates[1].sound, None);
}

/// Test: servo axis fields are read from the flattened servo table.
#[test]
fn servo_axis_flattened() {
    let cfg = HeliFxConfig::parse(FULL_CONFIG).unwrap();
    let pitch = &cfg.gun.pitch_servo;

    assert!(pitch.enabled);
    assert_eq!(pitch.input_pin, Some(5));
    assert_eq!(pitch.pwm_channel, Some(0));
    assert_eq!(pitch.axis.output_min_us, 800);
    assert_eq!(pitch.axis.output_max_us, 2200);
    assert_eq!(pitch.axis.max_speed_us_per_s, 500.0);
    assert_eq!(pitch.axis.update_rate_hz, 50);

    let yaw = &cfg.gun.yaw_servo;
    assert_eq!(yaw.axis.max_speed_us_per_s, 0.0);
    assert_eq!(yaw.axis.max_accel_us_per_s2, 0.0);
}

/// Test: empty file yields defaults everywhere.
#[test]
fn empty_file_uses_defaults() {
    let cfg = HeliFxConfig::parse("").unwrap();
    cfg.validate().unwrap();

    assert_eq!(cfg.gpio.output_driver, "simulation");
    assert_eq!(cfg.gpio.chip_path, Path::new("/dev/gpiochip0"));
    assert!(cfg.gun.enabled);
    assert!(cfg.gun.rates.is_empty());
    assert_eq!(cfg.gun.avg_window_ms, 200);
    assert!(!cfg.gun.pitch_servo.enabled);
}

/// Test: inverted servo output range is reported as InvalidRange.
#[test]
fn inverted_output_range_rejected() {
    let content = FULL_CONFIG.replace("output_min_us = 800", "output_min_us = 2400");
    let cfg = HeliFxConfig::parse(&content).unwrap();

    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::InvalidRange { field: "output", min: 2400, max: 2200 })
    ));
}

/// Test: zero rpm is rejected.
#[test]
fn zero_rpm_rejected() {
    let content = FULL_CONFIG.replace("rpm = 550", "rpm = 0");
    let cfg = HeliFxConfig::parse(&content).unwrap();

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("rpm"), "unexpected: {err}");
}

/// Test: audio HAT pin used as trigger is rejected.
#[test]
fn reserved_trigger_pin_rejected() {
    let content = FULL_CONFIG.replace("trigger_pin = 17", "trigger_pin = 20");
    let cfg = HeliFxConfig::parse(&content).unwrap();

    assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
}

/// Test: a disabled gun section is not validated.
#[test]
fn disabled_gun_skips_validation() {
    let content = FULL_CONFIG
        .replace("trigger_pin = 17", "enabled = false\ntrigger_pin = 20");
    let cfg = HeliFxConfig::parse(&content).unwrap();

    assert!(cfg.validate().is_ok());
}

/// Test: unknown log level is a parse error.
#[test]
fn bad_log_level_is_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "[shared]\nlog_level = \"loud\"\n");

    assert!(matches!(
        HeliFxConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}
