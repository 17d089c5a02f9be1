//! Simulation output driver.
//!
//! Keeps the last commanded value of every output in memory. Clones share
//! state, so a test can hand one clone to the gun controller and inspect
//! another.

use helifx_common::fx::config::HeliFxConfig;
use helifx_common::fx::driver::{OutputDriver, OutputError};
use helifx_common::fx::types::ServoAxisId;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Recorded output state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    /// Smoke fan
    pub fan_on: bool,
    /// Smoke heater
    pub heater_on: bool,
    /// Nozzle flash
    pub flash_on: bool,
    /// Flash off→on transitions
    pub flash_count: u64,
    /// Last pitch pulse [µs]
    pub pitch_us: Option<i32>,
    /// Last yaw pulse [µs]
    pub yaw_us: Option<i32>,
    /// `init()` was called
    pub initialized: bool,
    /// `shutdown()` was called
    pub shut_down: bool,
}

/// In-memory output driver.
#[derive(Debug, Clone, Default)]
pub struct SimulationOutput {
    state: Arc<Mutex<OutputSnapshot>>,
}

impl SimulationOutput {
    /// Driver with every output off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded state.
    pub fn snapshot(&self) -> OutputSnapshot {
        self.state.lock().clone()
    }
}

impl OutputDriver for SimulationOutput {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn init(&mut self, config: &HeliFxConfig) -> Result<(), OutputError> {
        info!(
            "Initializing simulation outputs (smoke={}, flash={}, pitch={}, yaw={})",
            config.gun.smoke.enabled,
            config.gun.nozzle_flash.enabled,
            config.gun.pitch_servo.enabled,
            config.gun.yaw_servo.enabled
        );
        self.state.lock().initialized = true;
        Ok(())
    }

    fn set_smoke_fan(&mut self, on: bool) -> Result<(), OutputError> {
        debug!("sim: smoke fan {}", on);
        self.state.lock().fan_on = on;
        Ok(())
    }

    fn set_smoke_heater(&mut self, on: bool) -> Result<(), OutputError> {
        debug!("sim: smoke heater {}", on);
        self.state.lock().heater_on = on;
        Ok(())
    }

    fn set_nozzle_flash(&mut self, on: bool) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        if on && !state.flash_on {
            state.flash_count += 1;
        }
        state.flash_on = on;
        Ok(())
    }

    fn write_servo(&mut self, axis: ServoAxisId, pulse_us: i32) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        match axis {
            ServoAxisId::Pitch => state.pitch_us = Some(pulse_us),
            ServoAxisId::Yaw => state.yaw_us = Some(pulse_us),
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        state.fan_on = false;
        state.heater_on = false;
        state.flash_on = false;
        state.shut_down = true;
        info!("Simulation outputs shut down");
        Ok(())
    }
}

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn OutputDriver> {
    Box::new(SimulationOutput::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let recorder = SimulationOutput::new();
        let mut driver = recorder.clone();
        driver.init(&HeliFxConfig::default()).unwrap();
        driver.set_smoke_fan(true).unwrap();
        driver.write_servo(ServoAxisId::Yaw, 1700).unwrap();

        let snap = recorder.snapshot();
        assert!(snap.initialized);
        assert!(snap.fan_on);
        assert_eq!(snap.yaw_us, Some(1700));
        assert_eq!(snap.pitch_us, None);
    }

    #[test]
    fn flash_count_counts_rising_transitions() {
        let recorder = SimulationOutput::new();
        let mut driver = recorder.clone();
        for on in [true, true, false, true, false] {
            driver.set_nozzle_flash(on).unwrap();
        }
        assert_eq!(recorder.snapshot().flash_count, 2);
    }

    #[test]
    fn shutdown_clears_outputs() {
        let recorder = SimulationOutput::new();
        let mut driver = recorder.clone();
        driver.set_smoke_heater(true).unwrap();
        driver.set_nozzle_flash(true).unwrap();
        driver.shutdown().unwrap();

        let snap = recorder.snapshot();
        assert!(!snap.heater_on && !snap.flash_on);
        assert!(snap.shut_down);
    }
}
