//! HeliFX runtime.
//!
//! `HeliFxCore` builds the capture monitors, turret servos and gun
//! controller from configuration, keeps them alive until shutdown is
//! requested, then tears them down gun first, servos next, monitors last.

use crate::capture::{CaptureRegistry, PwmMonitor};
use crate::clock::{Clock, MonotonicClock};
use crate::driver_registry::DriverRegistry;
use crate::error::CoreError;
use crate::gpio::EdgeProvider;
use crate::gpio::cdev::CdevEdgeProvider;
use crate::gun::{GunFireController, GunFx, GunInputs, GunServos, GunSettings, PulseInput};
use crate::servo::ServoProfiler;
use helifx_common::prelude::{GunFxConfig, HeliFxConfig, PinId, ServoChannelConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Supervisor poll interval of `run()`.
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// HeliFX runtime: owns every component.
pub struct HeliFxCore {
    config: HeliFxConfig,
    registry: CaptureRegistry,
    clock: Arc<dyn Clock>,
    drivers: DriverRegistry,
    /// Running flag for the supervisor loop
    running: Arc<AtomicBool>,
    monitors: Vec<Arc<PwmMonitor>>,
    servos: GunServos,
    gun: Option<GunFx>,
}

impl HeliFxCore {
    /// Create a runtime over the given edge provider and clock.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(
        config: HeliFxConfig,
        provider: Arc<dyn EdgeProvider>,
        clock: Arc<dyn Clock>,
        drivers: DriverRegistry,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let registry = CaptureRegistry::new(provider, Arc::clone(&clock))?;

        info!(
            "HeliFxCore created: service '{}', output driver '{}'",
            config.shared.service_name, config.gpio.output_driver
        );

        Ok(Self {
            config,
            registry,
            clock,
            drivers,
            running: Arc::new(AtomicBool::new(false)),
            monitors: Vec::new(),
            servos: GunServos::default(),
            gun: None,
        })
    }

    /// Runtime on the configured GPIO chip with the monotonic clock.
    pub fn with_hardware(config: HeliFxConfig) -> Result<Self, CoreError> {
        let provider = CdevEdgeProvider::open(&config.gpio.chip_path)?;
        Self::new(
            config,
            Arc::new(provider),
            Arc::new(MonotonicClock),
            DriverRegistry::with_builtin(),
        )
    }

    /// Build and start every configured component.
    ///
    /// On error, components created so far stay owned by `self` and are
    /// released by `shutdown()` or drop.
    pub fn init(&mut self) -> Result<(), CoreError> {
        let gun = self.config.gun.clone();
        if !gun.enabled {
            info!("Gun FX disabled");
            return Ok(());
        }

        let trigger = self.monitor(gun.trigger_pin, "gun_trigger", gun.avg_window_ms)?;
        let heater_toggle = if gun.smoke.enabled {
            self.monitor(gun.smoke.heater_toggle_pin, "smoke_heater_toggle", gun.avg_window_ms)?
        } else {
            None
        };
        let pitch_input = self.servo_input(&gun.pitch_servo, "gun_pitch", gun.avg_window_ms)?;
        let yaw_input = self.servo_input(&gun.yaw_servo, "gun_yaw", gun.avg_window_ms)?;

        self.servos.pitch = self.servo(&gun.pitch_servo, "pitch")?;
        self.servos.yaw = self.servo(&gun.yaw_servo, "yaw")?;

        let mut output = self.drivers.create_driver(&self.config.gpio.output_driver)?;
        info!("Created output driver: {} v{}", output.name(), output.version());
        output.init(&self.config)?;

        let controller = GunFireController::new(
            GunSettings::from_config(&gun)?,
            GunInputs {
                trigger: trigger.map(as_input),
                heater_toggle: heater_toggle.map(as_input),
                pitch: pitch_input.map(as_input),
                yaw: yaw_input.map(as_input),
            },
            self.servos.clone(),
            output,
            Arc::clone(&self.clock),
        );
        self.gun = Some(GunFx::spawn(controller)?);

        info!(
            "HeliFxCore initialized: {} monitors, {} servos",
            self.monitors.len(),
            usize::from(self.servos.pitch.is_some()) + usize::from(self.servos.yaw.is_some())
        );
        Ok(())
    }

    fn monitor(
        &mut self,
        pin: Option<PinId>,
        label: &str,
        avg_window_ms: u32,
    ) -> Result<Option<Arc<PwmMonitor>>, CoreError> {
        let Some(pin) = pin else {
            return Ok(None);
        };
        let monitor = Arc::new(self.registry.create(pin, label)?);
        monitor.set_avg_window(avg_window_ms);
        monitor.start()?;
        self.monitors.push(Arc::clone(&monitor));
        Ok(Some(monitor))
    }

    fn servo_input(
        &mut self,
        servo: &ServoChannelConfig,
        label: &str,
        avg_window_ms: u32,
    ) -> Result<Option<Arc<PwmMonitor>>, CoreError> {
        if !servo.enabled {
            return Ok(None);
        }
        self.monitor(servo.input_pin, label, avg_window_ms)
    }

    fn servo(
        &self,
        servo: &ServoChannelConfig,
        label: &str,
    ) -> Result<Option<Arc<ServoProfiler>>, CoreError> {
        if !servo.enabled {
            return Ok(None);
        }
        Ok(Some(Arc::new(ServoProfiler::create_named(label, servo.axis)?)))
    }

    /// Block until the running flag is cleared or the gun thread exits.
    pub fn run(&mut self) -> Result<(), CoreError> {
        self.running.store(true, Ordering::SeqCst);
        info!("HeliFxCore running");

        while self.running.load(Ordering::SeqCst) {
            if let Some(gun) = &self.gun {
                if !gun.is_running() {
                    error!("Gun thread exited unexpectedly");
                    break;
                }
            }
            std::thread::sleep(RUN_POLL_INTERVAL);
        }
        Ok(())
    }

    /// Tear everything down; every thread is joined before this returns.
    pub fn shutdown(&mut self) {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);

        if let Some(mut gun) = self.gun.take() {
            gun.stop();
        }
        self.servos = GunServos::default();
        for monitor in self.monitors.drain(..) {
            monitor.stop();
        }
        info!("HeliFxCore stopped");
    }

    /// Replace the gun settings at runtime.
    pub fn reconfigure_gun(&mut self, gun: &GunFxConfig) -> Result<(), CoreError> {
        gun.validate()?;
        let settings = GunSettings::from_config(gun)?;
        if let Some(fx) = &self.gun {
            fx.reconfigure(settings);
        }
        self.config.gun = gun.clone();
        Ok(())
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Running gun, if enabled.
    pub fn gun(&self) -> Option<&GunFx> {
        self.gun.as_ref()
    }

    /// Capture registry.
    pub fn registry(&self) -> &CaptureRegistry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &HeliFxConfig {
        &self.config
    }
}

impl Drop for HeliFxCore {
    fn drop(&mut self) {
        if self.gun.is_some() || !self.monitors.is_empty() {
            self.shutdown();
        }
    }
}

fn as_input(monitor: Arc<PwmMonitor>) -> Arc<dyn PulseInput> {
    monitor
}
