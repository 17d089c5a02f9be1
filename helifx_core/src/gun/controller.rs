//! Gun fire state machine.
//!
//! `GunFireController::tick` is called repeatedly by the gun thread (or
//! directly by tests) and owns every state transition:
//!
//! ```text
//!   Idle ──trigger ≥ lowest threshold──► Firing ──rate change──► Firing
//!    ▲                                     │  ▲
//!    │                           released  │  │ re-pressed
//!    │                                     ▼  │
//!    └──────── fan_off_delay elapsed ──── Stopping
//! ```
//!
//! Settings are re-read every tick, but derived values (shot interval,
//! fan-off deadline) only change on a transition. A firing cycle keeps the
//! rate table it started with and judges trigger movement against it; the
//! latest table is adopted once the trigger leaves the band in force.

use super::settings::GunSettings;
use crate::capture::PwmMonitor;
use crate::clock::Clock;
use crate::servo::ServoProfiler;
use helifx_common::consts::STATUS_INTERVAL_MS;
use helifx_common::fx::driver::{OutputDriver, OutputError};
use helifx_common::fx::types::{GunEvent, GunStatus, PulseReading, ServoAxisId, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Depth of the side-effect event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Receiver channel as seen by the gun controller.
pub trait PulseInput: Send + Sync {
    /// Windowed average at `now`, `None` without recent data.
    fn average(&self, now: Timestamp) -> Option<i32>;

    /// Block up to `timeout` for a fresh reading.
    fn wait(&self, timeout: Duration) -> Option<PulseReading>;
}

impl PulseInput for PwmMonitor {
    fn average(&self, now: Timestamp) -> Option<i32> {
        self.average_at(now)
    }

    fn wait(&self, timeout: Duration) -> Option<PulseReading> {
        PwmMonitor::wait(self, Some(timeout))
    }
}

/// Receiver channels feeding the gun.
#[derive(Clone, Default)]
pub struct GunInputs {
    /// Trigger channel
    pub trigger: Option<Arc<dyn PulseInput>>,
    /// Smoke heater toggle channel
    pub heater_toggle: Option<Arc<dyn PulseInput>>,
    /// Pitch set-point channel
    pub pitch: Option<Arc<dyn PulseInput>>,
    /// Yaw set-point channel
    pub yaw: Option<Arc<dyn PulseInput>>,
}

/// Turret servos driven by the gun.
#[derive(Debug, Clone, Default)]
pub struct GunServos {
    /// Elevation axis
    pub pitch: Option<Arc<ServoProfiler>>,
    /// Traverse axis
    pub yaw: Option<Arc<ServoProfiler>>,
}

/// Gun state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GunFireState {
    /// Trigger released, fan off
    #[default]
    Idle,
    /// Trigger in a rate band
    Firing,
    /// Trigger released, fan running on until the deadline
    Stopping,
}

/// Per-axis forwarding bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
struct AxisTrack {
    /// Last averaged set-point from the receiver
    base_input: Option<i32>,
    /// Last value handed to `set_input`
    commanded: Option<i32>,
    /// Last value written to the output driver
    written: Option<i32>,
}

/// Gun fire controller.
pub struct GunFireController {
    settings: Arc<RwLock<Arc<GunSettings>>>,
    inputs: GunInputs,
    servos: GunServos,
    output: Box<dyn OutputDriver>,
    clock: Arc<dyn Clock>,

    state: GunFireState,
    /// Settings the current firing cycle started under
    cycle: Option<Arc<GunSettings>>,
    rate_index: Option<usize>,
    rpm: Option<u32>,
    shot_interval_ms: u32,
    firing_since: Timestamp,
    fan_off_deadline: Option<Timestamp>,

    trigger_pwm_us: Option<i32>,
    heater_on: bool,
    fan_on: bool,
    flash_on: bool,
    axes: [AxisTrack; 2],

    next_status: Option<Timestamp>,
    status: Arc<Mutex<GunStatus>>,
    events_tx: flume::Sender<GunEvent>,
    events_rx: flume::Receiver<GunEvent>,
    output_errors: u64,
}

impl GunFireController {
    /// Create an idle controller.
    pub fn new(
        settings: GunSettings,
        inputs: GunInputs,
        servos: GunServos,
        output: Box<dyn OutputDriver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events_tx, events_rx) = flume::bounded(EVENT_CHANNEL_CAPACITY);
        info!(
            "Gun controller created: {} rates, fan-off {} ms, output '{}'",
            settings.rates.len(),
            settings.fan_off_delay.as_millis(),
            output.name()
        );
        Self {
            settings: Arc::new(RwLock::new(Arc::new(settings))),
            inputs,
            servos,
            output,
            clock,
            state: GunFireState::Idle,
            cycle: None,
            rate_index: None,
            rpm: None,
            shot_interval_ms: 0,
            firing_since: Timestamp::ZERO,
            fan_off_deadline: None,
            trigger_pwm_us: None,
            heater_on: false,
            fan_on: false,
            flash_on: false,
            axes: [AxisTrack::default(); 2],
            next_status: None,
            status: Arc::new(Mutex::new(GunStatus::default())),
            events_tx,
            events_rx,
            output_errors: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> GunFireState {
        self.state
    }

    /// Selected rate while firing.
    pub fn rate_index(&self) -> Option<usize> {
        self.rate_index
    }

    /// `60000 / rpm` of the rate in force; 0 before the first shot.
    pub fn shot_interval_ms(&self) -> u32 {
        self.shot_interval_ms
    }

    /// Fan-off deadline, only set while stopping.
    pub fn fan_off_deadline(&self) -> Option<Timestamp> {
        self.fan_off_deadline
    }

    /// Latest status snapshot.
    pub fn status(&self) -> GunStatus {
        self.status.lock().clone()
    }

    /// Side-effect event stream.
    pub fn events(&self) -> flume::Receiver<GunEvent> {
        self.events_rx.clone()
    }

    /// Replace the settings; takes effect at the next transition.
    pub fn reconfigure(&self, settings: GunSettings) {
        *self.settings.write() = Arc::new(settings);
        info!("Gun settings replaced");
    }

    pub(crate) fn settings_handle(&self) -> Arc<RwLock<Arc<GunSettings>>> {
        Arc::clone(&self.settings)
    }

    pub(crate) fn status_handle(&self) -> Arc<Mutex<GunStatus>> {
        Arc::clone(&self.status)
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(crate) fn trigger(&self) -> Option<Arc<dyn PulseInput>> {
        self.inputs.trigger.clone()
    }

    /// Run one processing step at `now`.
    pub fn tick(&mut self, now: Timestamp) {
        let settings = Arc::clone(&*self.settings.read());

        self.update_trigger(&settings, now);
        self.update_fan_off(now);
        self.update_heater(&settings, now);

        let kick = self.in_shot_kick(now);
        self.update_flash(&settings, kick);
        let recoil = if kick { settings.recoil_offset_us } else { 0 };
        self.update_servos(recoil, now);

        self.publish_status(now);
    }

    /// Switch every output off and release the driver.
    pub fn shutdown(&mut self) {
        if self.flash_on {
            self.set_flash(false);
        }
        if self.fan_on {
            self.set_fan(false);
        }
        if self.heater_on {
            self.set_heater(false);
        }
        if let Err(e) = self.output.shutdown() {
            warn!("Output driver '{}' shutdown failed: {}", self.output.name(), e);
        }
        info!("Gun controller shut down in state {:?}", self.state);
    }

    fn update_trigger(&mut self, settings: &Arc<GunSettings>, now: Timestamp) {
        let Some(trigger) = &self.inputs.trigger else {
            return;
        };
        // Missing data holds the current state.
        let Some(pwm) = trigger.average(now) else {
            return;
        };
        self.trigger_pwm_us = Some(pwm);

        if self.state != GunFireState::Firing {
            if let Some(index) = settings.rates.select(pwm) {
                self.enter_firing(settings, index, now);
            }
            return;
        }

        let held = match &self.cycle {
            Some(cycle) => cycle.rates.select(pwm) == self.rate_index,
            None => false,
        };
        if held {
            return;
        }
        match settings.rates.select(pwm) {
            Some(index) => self.change_rate(settings, index, now),
            None => self.enter_stopping(settings, now),
        }
    }

    fn enter_firing(&mut self, settings: &Arc<GunSettings>, index: usize, now: Timestamp) {
        let Some(entry) = settings.rates.get(index) else {
            return;
        };
        let resumed = self.state == GunFireState::Stopping;
        self.cycle = Some(Arc::clone(settings));
        self.apply_rate(index, entry.rpm, entry.shot_interval_ms(), now);
        self.fan_off_deadline = None;
        self.state = GunFireState::Firing;

        info!(
            "Gun firing{}: '{}' {} rpm, {} ms/shot",
            if resumed { " (resumed)" } else { "" },
            entry.name,
            entry.rpm,
            self.shot_interval_ms
        );

        if settings.smoke_enabled && !self.fan_on {
            self.set_fan(true);
        }
        self.emit(GunEvent::FiringStarted {
            rate_index: index,
            name: entry.name.clone(),
            rpm: entry.rpm,
            shot_interval_ms: self.shot_interval_ms,
            sound: entry.sound.clone(),
        });
    }

    fn change_rate(&mut self, settings: &Arc<GunSettings>, index: usize, now: Timestamp) {
        let Some(entry) = settings.rates.get(index) else {
            return;
        };
        self.cycle = Some(Arc::clone(settings));
        self.apply_rate(index, entry.rpm, entry.shot_interval_ms(), now);
        info!(
            "Gun rate changed: '{}' {} rpm, {} ms/shot",
            entry.name, entry.rpm, self.shot_interval_ms
        );
        self.emit(GunEvent::RateChanged {
            rate_index: index,
            name: entry.name.clone(),
            rpm: entry.rpm,
            shot_interval_ms: self.shot_interval_ms,
            sound: entry.sound.clone(),
        });
    }

    fn apply_rate(&mut self, index: usize, rpm: u32, shot_interval_ms: u32, now: Timestamp) {
        self.rate_index = Some(index);
        self.rpm = Some(rpm);
        self.shot_interval_ms = shot_interval_ms;
        self.firing_since = now;
    }

    fn enter_stopping(&mut self, settings: &GunSettings, now: Timestamp) {
        let deadline = now + settings.fan_off_delay;
        self.fan_off_deadline = Some(deadline);
        self.state = GunFireState::Stopping;
        self.cycle = None;
        self.rate_index = None;
        self.rpm = None;
        if self.flash_on {
            self.set_flash(false);
        }
        info!(
            "Gun stopping, fan off in {} ms",
            settings.fan_off_delay.as_millis()
        );
        self.emit(GunEvent::FiringStopped);
    }

    fn update_fan_off(&mut self, now: Timestamp) {
        if self.state != GunFireState::Stopping {
            return;
        }
        if self.fan_off_deadline.is_some_and(|deadline| now >= deadline) {
            if self.fan_on {
                self.set_fan(false);
            }
            self.fan_off_deadline = None;
            self.state = GunFireState::Idle;
            info!("Gun idle");
        }
    }

    fn update_heater(&mut self, settings: &GunSettings, now: Timestamp) {
        let wanted = if settings.smoke_enabled {
            match self.inputs.heater_toggle.as_ref().and_then(|t| t.average(now)) {
                Some(pwm) => pwm >= settings.heater_threshold_us,
                None => self.heater_on,
            }
        } else {
            false
        };
        if wanted != self.heater_on {
            self.set_heater(wanted);
        }
    }

    /// True during the first half of each shot while firing.
    fn in_shot_kick(&self, now: Timestamp) -> bool {
        if self.state != GunFireState::Firing || self.shot_interval_ms == 0 {
            return false;
        }
        let interval_ns = u64::from(self.shot_interval_ms) * 1_000_000;
        let elapsed_ns = now.saturating_duration_since(self.firing_since).as_nanos() as u64;
        elapsed_ns % interval_ns < interval_ns / 2
    }

    fn update_flash(&mut self, settings: &GunSettings, kick: bool) {
        let wanted = settings.flash_enabled && kick;
        if wanted != self.flash_on {
            self.set_flash(wanted);
        }
    }

    fn update_servos(&mut self, recoil_us: i32, now: Timestamp) {
        if let Some(servo) = self.servos.pitch.clone() {
            let input = self.inputs.pitch.clone();
            self.drive_axis(ServoAxisId::Pitch, &servo, input.as_deref(), recoil_us, now);
        }
        if let Some(servo) = self.servos.yaw.clone() {
            let input = self.inputs.yaw.clone();
            self.drive_axis(ServoAxisId::Yaw, &servo, input.as_deref(), 0, now);
        }
    }

    fn drive_axis(
        &mut self,
        axis: ServoAxisId,
        servo: &ServoProfiler,
        input: Option<&dyn PulseInput>,
        offset_us: i32,
        now: Timestamp,
    ) {
        let idx = axis_index(axis);

        if let Some(avg) = input.and_then(|i| i.average(now)) {
            self.axes[idx].base_input = Some(avg);
        }
        let base = self.axes[idx].base_input.or_else(|| {
            (offset_us != 0).then(|| {
                let config = servo.config();
                config.input_min_us + (config.input_max_us - config.input_min_us) / 2
            })
        });

        if let Some(base) = base {
            let command = base + offset_us;
            if self.axes[idx].commanded != Some(command) {
                servo.set_input(command);
                self.axes[idx].commanded = Some(command);
            }
        }

        let out = servo.output();
        if self.axes[idx].written != Some(out) {
            self.axes[idx].written = Some(out);
            let result = self.output.write_servo(axis, out);
            self.check_output(axis.as_str(), result);
        }
    }

    fn publish_status(&mut self, now: Timestamp) {
        let status = GunStatus {
            firing: self.state == GunFireState::Firing,
            rate_index: self.rate_index,
            rpm: self.rpm,
            trigger_pwm_us: self.trigger_pwm_us,
            heater_on: self.heater_on,
            fan_on: self.fan_on,
            pitch_output: self.servos.pitch.as_ref().map(|s| s.output()),
            yaw_output: self.servos.yaw.as_ref().map(|s| s.output()),
        };
        *self.status.lock() = status.clone();

        let due = *self
            .next_status
            .get_or_insert(now + Duration::from_millis(STATUS_INTERVAL_MS));
        if now >= due {
            self.next_status = Some(now + Duration::from_millis(STATUS_INTERVAL_MS));
            match serde_json::to_string(&status) {
                Ok(json) => info!("Gun status: {}", json),
                Err(e) => warn!("Gun status serialization failed: {}", e),
            }
            self.emit(GunEvent::Status(status));
        }
    }

    fn set_fan(&mut self, on: bool) {
        self.fan_on = on;
        let result = self.output.set_smoke_fan(on);
        self.check_output("smoke fan", result);
        info!("Smoke fan {}", if on { "on" } else { "off" });
        self.emit(if on { GunEvent::SmokeFanOn } else { GunEvent::SmokeFanOff });
    }

    fn set_heater(&mut self, on: bool) {
        self.heater_on = on;
        let result = self.output.set_smoke_heater(on);
        self.check_output("smoke heater", result);
        info!("Smoke heater {}", if on { "on" } else { "off" });
        self.emit(if on { GunEvent::HeaterOn } else { GunEvent::HeaterOff });
    }

    fn set_flash(&mut self, on: bool) {
        self.flash_on = on;
        let result = self.output.set_nozzle_flash(on);
        self.check_output("nozzle flash", result);
    }

    fn check_output(&mut self, what: &str, result: Result<(), OutputError>) {
        if let Err(e) = result {
            self.output_errors += 1;
            if self.output_errors <= 10 || self.output_errors % 1000 == 0 {
                warn!("Output error #{} on {}: {}", self.output_errors, what, e);
            }
        }
    }

    fn emit(&self, event: GunEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!("Gun event dropped (channel full)");
        }
    }
}

const fn axis_index(axis: ServoAxisId) -> usize {
    match axis {
        ServoAxisId::Pitch => 0,
        ServoAxisId::Yaw => 1,
    }
}

impl std::fmt::Debug for GunFireController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GunFireController")
            .field("state", &self.state)
            .field("rate_index", &self.rate_index)
            .field("shot_interval_ms", &self.shot_interval_ms)
            .field("fan_off_deadline", &self.fan_off_deadline)
            .finish()
    }
}
