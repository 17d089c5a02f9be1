//! Trapezoidal motion profile for one servo axis.
//!
//! Pure integrator, no threads: `step(dt)` advances one control tick.
//!
//! Per tick, with error `e = target - position`:
//! - speed limit 0: jump to target (instant mode)
//! - accel limit 0: move at full speed toward target
//! - otherwise: chase `sign(e) * min(max_speed, sqrt(2 * max_accel * |e|))`,
//!   changing velocity by at most `max_accel * dt`
//!
//! A step that would reach or pass the target lands exactly on it. Velocity
//! left over on arrival is bled off at `max_accel` on the following ticks
//! while the position holds.

use helifx_common::fx::config::ServoAxisConfig;
use serde::Serialize;
use tracing::trace;

/// Position error treated as "on target" [µs].
const ARRIVAL_EPSILON_US: f32 = 1e-3;

/// Snapshot of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServoAxisState {
    /// Set-point [µs]
    pub target_us: i32,
    /// Commanded output [µs]
    pub output_us: i32,
    /// Current velocity [µs/s]
    pub velocity_us_per_s: f32,
}

/// Motion state and limits of one axis.
#[derive(Debug, Clone)]
pub struct MotionProfile {
    config: ServoAxisConfig,
    target_us: i32,
    position: f32,
    velocity: f32,
}

impl MotionProfile {
    /// Profile at rest on the output midpoint.
    ///
    /// `config` is assumed valid.
    pub fn new(config: ServoAxisConfig) -> Self {
        let mid = config.output_midpoint();
        Self {
            config,
            target_us: mid,
            position: mid as f32,
            velocity: 0.0,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ServoAxisConfig {
        &self.config
    }

    /// Replace limits and ranges; position and velocity carry over.
    pub fn set_config(&mut self, config: ServoAxisConfig) {
        self.config = config;
    }

    /// Map `input_us` through the configured ranges and make it the target.
    pub fn set_input(&mut self, input_us: i32) {
        self.target_us = self.config.map_input(input_us);
    }

    /// Set the target directly in output units.
    pub fn set_target(&mut self, target_us: i32) {
        self.target_us = target_us;
    }

    /// Place the axis at `position_us`, at rest, ignoring every limit.
    pub fn reset(&mut self, position_us: i32) {
        self.target_us = position_us;
        self.position = position_us as f32;
        self.velocity = 0.0;
    }

    /// Set-point [µs].
    pub fn target(&self) -> i32 {
        self.target_us
    }

    /// Output [µs], rounded.
    pub fn output(&self) -> i32 {
        self.position.round() as i32
    }

    /// Velocity [µs/s].
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Snapshot.
    pub fn state(&self) -> ServoAxisState {
        ServoAxisState {
            target_us: self.target_us,
            output_us: self.output(),
            velocity_us_per_s: self.velocity,
        }
    }

    /// Control tick period for the configured rate.
    pub fn tick_period_s(&self) -> f32 {
        1.0 / self.config.update_rate_hz.max(1) as f32
    }

    /// A reversal may carry the axis past the old target; hold it at the
    /// range edge while the velocity turns around at the normal rate.
    fn clamp_to_output_range(&mut self) {
        let min = self.config.output_min_us as f32;
        let max = self.config.output_max_us as f32;
        self.position = self.position.clamp(min, max);
    }

    /// Advance one tick of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        let max_speed = self.config.max_speed_us_per_s;
        let max_accel = self.config.max_accel_us_per_s2;
        let target = self.target_us as f32;
        let error = target - self.position;

        if max_speed <= 0.0 {
            self.position = target;
            self.velocity = 0.0;
            return;
        }

        if max_accel <= 0.0 {
            let step = max_speed * dt;
            if error.abs() <= step {
                self.position = target;
                self.velocity = 0.0;
            } else {
                self.velocity = max_speed.copysign(error);
                self.position += self.velocity * dt;
            }
            return;
        }

        let dv_max = max_accel * dt;

        if error.abs() < ARRIVAL_EPSILON_US {
            self.position = target;
            self.velocity -= self.velocity.clamp(-dv_max, dv_max);
            return;
        }

        // Fastest speed that can still stop within the remaining distance.
        let braking_speed = (2.0 * max_accel * error.abs()).sqrt();
        let desired = max_speed.min(braking_speed).copysign(error);
        let velocity = self.velocity + (desired - self.velocity).clamp(-dv_max, dv_max);
        let step = velocity * dt;

        if step * error > 0.0 && step.abs() >= error.abs() {
            self.position = target;
            self.velocity = if self.velocity.abs() <= dv_max { 0.0 } else { velocity };
        } else {
            self.position += step;
            self.velocity = velocity;
            if step * error < 0.0 {
                self.clamp_to_output_range();
            }
        }

        trace!(
            "servo step: target={} pos={:.2} vel={:.2}",
            self.target_us, self.position, self.velocity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(speed: f32, accel: f32) -> ServoAxisConfig {
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

    #[test]
    fn starts_at_output_midpoint() {
        let profile = MotionProfile::new(config(500.0, 2000.0));
        assert_eq!(profile.output(), 1500);
        assert_eq!(profile.target(), 1500);
        assert_eq!(profile.velocity(), 0.0);
    }

    #[test]
    fn instant_mode_jumps_on_next_tick() {
        let mut profile = MotionProfile::new(config(0.0, 2000.0));
        profile.set_input(2000);
        assert_eq!(profile.output(), 1500);
        profile.step(0.02);
        assert_eq!(profile.output(), 2200);
        assert_eq!(profile.velocity(), 0.0);
    }

    #[test]
    fn unlimited_accel_moves_at_full_speed() {
        let mut profile = MotionProfile::new(config(500.0, 0.0));
        profile.set_target(1520);
        profile.step(0.02);
        assert_eq!(profile.output(), 1510);
        assert_eq!(profile.velocity(), 500.0);
        profile.step(0.02);
        assert_eq!(profile.output(), 1520);
        assert_eq!(profile.velocity(), 0.0);
    }

    #[test]
    fn accelerates_by_at_most_accel_dt() {
        let mut profile = MotionProfile::new(config(500.0, 2000.0));
        profile.set_target(2200);
        profile.step(0.02);
        assert!((profile.velocity() - 40.0).abs() < 1e-3);
        profile.step(0.02);
        assert!((profile.velocity() - 80.0).abs() < 1e-3);
    }

    #[test]
    fn settles_exactly_on_target_without_overshoot() {
        let mut profile = MotionProfile::new(config(500.0, 2000.0));
        profile.reset(1500);
        profile.set_input(2000);

        let mut last = profile.output();
        let mut peak = 0.0f32;
        for _ in 0..200 {
            profile.step(0.02);
            assert!(profile.output() >= last, "output must rise monotonically");
            assert!(profile.output() <= 2200);
            peak = peak.max(profile.velocity());
            last = profile.output();
        }
        assert_eq!(profile.output(), 2200);
        assert_eq!(profile.velocity(), 0.0);
        assert!(peak <= 500.0);
    }

    #[test]
    fn reset_bypasses_limits() {
        let mut profile = MotionProfile::new(config(10.0, 10.0));
        profile.set_target(2000);
        profile.step(0.02);
        profile.reset(900);
        assert_eq!(profile.state(), ServoAxisState {
            target_us: 900,
            output_us: 900,
            velocity_us_per_s: 0.0,
        });
    }

    #[test]
    fn reversal_decelerates_before_turning() {
        let mut profile = MotionProfile::new(config(500.0, 2000.0));
        profile.set_target(2200);
        for _ in 0..20 {
            profile.step(0.02);
        }
        let v = profile.velocity();
        assert!(v > 0.0);
        profile.set_target(800);
        profile.step(0.02);
        assert!((v - profile.velocity() - 40.0).abs() < 1e-3);
    }
}
