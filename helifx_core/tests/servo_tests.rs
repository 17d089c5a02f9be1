//! Servo motion profiler integration tests.
//!
//! The profiler runs its own control thread, so thread-level tests sample
//! its output over wall-clock time; the profile bounds are checked
//! exhaustively against `MotionProfile` with proptest.

use helifx_common::config::ConfigError;
use helifx_common::fx::config::ServoAxisConfig;
use helifx_core::error::ServoError;
use helifx_core::servo::{MotionProfile, ServoProfiler};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn axis(speed: f32, accel: f32) -> ServoAxisConfig {
    ServoAxisConfig {
        input_min_us: 1000,
        input_max_us: 2000,
        output_min_us: 800,
        output_max_us: 2200,
        max_speed_us_per_s: speed,
        max_accel_us_per_s2: accel,
        update_rate_hz: 50,
    }
}

// ─── Profiler thread ────────────────────────────────────────────────

/// Test: 1500 → 2200 rises monotonically, within the speed limit, and
/// settles on the target without overshoot.
#[test]
fn sweep_to_max_is_monotonic_and_bounded() {
    let servo = ServoProfiler::create(axis(500.0, 2000.0)).unwrap();
    servo.reset(1500);
    servo.set_input(2000);
    assert_eq!(servo.target(), 2200);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut last = servo.output();
    let mut settled = 0;
    while settled < 10 && Instant::now() < deadline {
        let state = servo.state();
        assert!(state.output_us >= last, "output went back: {} -> {}", last, state.output_us);
        assert!(state.output_us <= 2200, "overshoot: {}", state.output_us);
        assert!(state.velocity_us_per_s <= 500.0 + 1e-3, "too fast: {}", state.velocity_us_per_s);
        last = state.output_us;
        settled = if state.output_us == 2200 { settled + 1 } else { 0 };
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(servo.output(), 2200);
}

/// Test: zero speed limit follows the input on the next tick.
#[test]
fn instant_mode_follows_input() {
    let servo = ServoProfiler::create(axis(0.0, 0.0)).unwrap();
    servo.set_input(1000);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(servo.output(), 800);
    assert_eq!(servo.velocity(), 0.0);
}

/// Test: inputs outside the input range are clamped.
#[test]
fn input_is_clamped_to_range() {
    let servo = ServoProfiler::create(axis(0.0, 0.0)).unwrap();
    servo.set_input(2600);
    assert_eq!(servo.target(), 2200);
    servo.set_input(400);
    assert_eq!(servo.target(), 800);
}

/// Test: reset places the axis immediately, at rest.
#[test]
fn reset_bypasses_limits() {
    let servo = ServoProfiler::create(axis(10.0, 10.0)).unwrap();
    servo.reset(2100);
    let state = servo.state();
    assert_eq!(state.output_us, 2100);
    assert_eq!(state.target_us, 2100);
    assert_eq!(state.velocity_us_per_s, 0.0);
}

/// Test: an invalid configuration is rejected at creation.
#[test]
fn create_rejects_invalid_config() {
    let mut config = axis(500.0, 2000.0);
    config.input_max_us = config.input_min_us;
    assert!(matches!(
        ServoProfiler::create(config),
        Err(ServoError::Config(ConfigError::InvalidRange { field: "input", .. }))
    ));
}

/// Test: set_config rejects invalid limits and keeps the old configuration.
#[test]
fn set_config_keeps_previous_on_error() {
    let servo = ServoProfiler::create(axis(500.0, 2000.0)).unwrap();

    let bad = ServoAxisConfig {
        max_speed_us_per_s: -1.0,
        ..axis(500.0, 2000.0)
    };
    assert!(servo.set_config(bad).is_err());
    assert_eq!(servo.config(), axis(500.0, 2000.0));

    servo.set_config(axis(0.0, 0.0)).unwrap();
    assert_eq!(servo.config().max_speed_us_per_s, 0.0);
}

/// Test: reconfiguring does not move the axis.
#[test]
fn set_config_keeps_position() {
    let servo = ServoProfiler::create(axis(500.0, 2000.0)).unwrap();
    servo.reset(1700);
    servo
        .set_config(ServoAxisConfig {
            output_min_us: 1000,
            output_max_us: 2000,
            ..axis(500.0, 2000.0)
        })
        .unwrap();
    assert_eq!(servo.output(), 1700);
}

/// Test: dropping the profiler joins its control thread promptly.
#[test]
fn drop_joins_control_thread() {
    let servo = ServoProfiler::create_named("pitch", axis(500.0, 2000.0)).unwrap();
    assert_eq!(servo.label(), "pitch");
    let begin = Instant::now();
    drop(servo);
    assert!(begin.elapsed() < Duration::from_secs(1));
}

// ─── Profile properties ─────────────────────────────────────────────

prop_compose! {
    fn limited_axis()(
        speed in 100.0f32..5000.0,
        accel in 500.0f32..20_000.0,
        rate in 10u32..400,
    ) -> ServoAxisConfig {
        ServoAxisConfig {
            max_speed_us_per_s: speed,
            max_accel_us_per_s2: accel,
            update_rate_hz: rate,
            ..axis(500.0, 2000.0)
        }
    }
}

proptest! {
    /// Any sequence of set-points keeps the output in range and within the
    /// speed and acceleration limits.
    #[test]
    fn profile_respects_limits(
        config in limited_axis(),
        inputs in prop::collection::vec((900i32..2100, 1usize..200), 1..8),
    ) {
        let mut profile = MotionProfile::new(config);
        let dt = profile.tick_period_s();
        let dv_max = config.max_accel_us_per_s2 * dt;

        for (input, ticks) in inputs {
            profile.set_input(input);
            for _ in 0..ticks {
                let before = profile.velocity();
                profile.step(dt);
                let output = profile.output();
                prop_assert!((800..=2200).contains(&output), "output {} out of range", output);
                prop_assert!(profile.velocity().abs() <= config.max_speed_us_per_s * 1.0001);
                prop_assert!((profile.velocity() - before).abs() <= dv_max * 1.0001 + 1e-2);
            }
        }
    }

    /// Approaching a fixed target never passes it.
    #[test]
    fn profile_never_overshoots(config in limited_axis(), input in 1000i32..=2000) {
        let mut profile = MotionProfile::new(config);
        let dt = profile.tick_period_s();
        profile.set_input(input);
        let target = profile.target();
        let start = profile.output();

        for _ in 0..20_000 {
            profile.step(dt);
            let output = profile.output();
            if target >= start {
                prop_assert!(output <= target);
            } else {
                prop_assert!(output >= target);
            }
        }
        prop_assert_eq!(profile.output(), target);
    }
}
