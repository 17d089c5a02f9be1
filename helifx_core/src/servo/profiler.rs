//! Threaded servo profiler.

use super::profile::{MotionProfile, ServoAxisState};
use crate::error::ServoError;
use helifx_common::config::ConfigError;
use helifx_common::fx::config::ServoAxisConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// One servo axis with its own fixed-rate control thread.
///
/// All accessors are thread-safe. Writes land on the next tick; the control
/// thread is the only writer of output and velocity. Dropping the profiler
/// stops and joins the thread.
pub struct ServoProfiler {
    label: String,
    profile: Arc<Mutex<MotionProfile>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ServoProfiler {
    /// Validate `config` and start the control loop.
    pub fn create(config: ServoAxisConfig) -> Result<Self, ServoError> {
        Self::create_named("servo", config)
    }

    /// Like `create`, with a name for the thread and logs.
    pub fn create_named(label: &str, config: ServoAxisConfig) -> Result<Self, ServoError> {
        config.validate()?;

        let profile = Arc::new(Mutex::new(MotionProfile::new(config)));
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let profile = Arc::clone(&profile);
            let running = Arc::clone(&running);
            let label = label.to_string();
            std::thread::Builder::new()
                .name(format!("servo-{label}"))
                .spawn(move || control_loop(&label, &profile, &running))
                .map_err(|e| ServoError::Thread(e.to_string()))?
        };

        info!(
            "Servo '{}' created: in {}..{} µs, out {}..{} µs, {} µs/s, {} µs/s², {} Hz",
            label,
            config.input_min_us,
            config.input_max_us,
            config.output_min_us,
            config.output_max_us,
            config.max_speed_us_per_s,
            config.max_accel_us_per_s2,
            config.update_rate_hz
        );

        Ok(Self {
            label: label.to_string(),
            profile,
            running,
            handle: Some(handle),
        })
    }

    /// Name given at creation.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Map `input_us` into the output range and make it the new target.
    pub fn set_input(&self, input_us: i32) {
        self.profile.lock().set_input(input_us);
    }

    /// Commanded output [µs].
    pub fn output(&self) -> i32 {
        self.profile.lock().output()
    }

    /// Target [µs].
    pub fn target(&self) -> i32 {
        self.profile.lock().target()
    }

    /// Velocity [µs/s].
    pub fn velocity(&self) -> f32 {
        self.profile.lock().velocity()
    }

    /// Consistent snapshot of target, output and velocity.
    pub fn state(&self) -> ServoAxisState {
        self.profile.lock().state()
    }

    /// Jump to `position_us` at rest, bypassing speed and acceleration limits.
    pub fn reset(&self, position_us: i32) {
        self.profile.lock().reset(position_us);
        debug!("Servo '{}' reset to {} µs", self.label, position_us);
    }

    /// Replace the configuration without moving the axis.
    ///
    /// An invalid configuration is rejected and the previous one stays active.
    pub fn set_config(&self, config: ServoAxisConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.profile.lock().set_config(config);
        info!("Servo '{}' reconfigured", self.label);
        Ok(())
    }

    /// Active configuration.
    pub fn config(&self) -> ServoAxisConfig {
        *self.profile.lock().config()
    }
}

impl std::fmt::Debug for ServoProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServoProfiler")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for ServoProfiler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Servo '{}' control thread panicked", self.label);
            }
        }
        info!("Servo '{}' destroyed", self.label);
    }
}

fn control_loop(label: &str, profile: &Mutex<MotionProfile>, running: &AtomicBool) {
    debug!("Servo '{}' control loop started", label);

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();

        let period = {
            let mut profile = profile.lock();
            let dt = profile.tick_period_s();
            profile.step(dt);
            Duration::from_secs_f32(dt)
        };

        // Sleep for remaining cycle time
        let elapsed = cycle_start.elapsed();
        if elapsed < period {
            std::thread::sleep(period - elapsed);
        }
    }

    debug!("Servo '{}' control loop stopped", label);
}
