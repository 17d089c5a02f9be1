//! Per-pin pulse monitor.
//!
//! A `PwmMonitor` pairs rising and falling edges from its pin into
//! `PulseReading`s. Edges are delivered by the registry's shared polling
//! thread; readers use the non-blocking accessors below.

use super::registry::RegistryInner;
use super::window::CaptureWindow;
use crate::clock::Clock;
use crate::error::StartError;
use crate::gpio::{EdgeEvent, EdgeKind, EdgeSource};
use helifx_common::consts::{
    DEFAULT_AVG_WINDOW_MS, MAX_AVG_WINDOW_MS, MIN_AVG_WINDOW_MS, PULSE_MAX_US, PULSE_MIN_US,
};
use helifx_common::fx::types::{PinId, PulseReading, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

/// Reader-visible state, guarded by the monitor's own lock.
#[derive(Debug)]
struct MonitorState {
    /// Start of the pulse in flight
    rise: Option<Timestamp>,
    /// Most recent unread reading
    latest: Option<PulseReading>,
    window: CaptureWindow,
    avg_window_ms: u32,
    seen_signal: bool,
    accepted: u64,
    rejected: u64,
    read_errors: u64,
    subscribers: Vec<flume::Sender<PulseReading>>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            rise: None,
            latest: None,
            window: CaptureWindow::new(),
            avg_window_ms: DEFAULT_AVG_WINDOW_MS,
            seen_signal: false,
            accepted: 0,
            rejected: 0,
            read_errors: 0,
            subscribers: Vec::new(),
        }
    }

    /// Feed one edge; returns the reading it completes, if any.
    fn on_edge(&mut self, pin: PinId, event: EdgeEvent) -> Option<PulseReading> {
        match event.kind {
            EdgeKind::Rising => {
                self.rise = Some(event.timestamp);
                None
            }
            EdgeKind::Falling => {
                let rise = self.rise.take()?;
                let width_us = event.timestamp.nanos_since(rise) / 1000;
                if width_us < i64::from(PULSE_MIN_US) || width_us > i64::from(PULSE_MAX_US) {
                    self.rejected += 1;
                    trace!("GPIO {}: discarded {} µs pulse", pin, width_us);
                    return None;
                }

                let reading = PulseReading {
                    pin,
                    duration_us: width_us as i32,
                    captured_at: event.timestamp,
                };
                self.latest = Some(reading);
                self.window.push(reading.duration_us, reading.captured_at);
                self.accepted += 1;
                Some(reading)
            }
        }
    }

    fn publish(&mut self, reading: PulseReading) {
        self.subscribers.retain(|tx| match tx.try_send(reading) {
            Ok(()) | Err(flume::TrySendError::Full(_)) => true,
            Err(flume::TrySendError::Disconnected(_)) => false,
        });
    }
}

/// State shared between a monitor handle and the polling thread.
pub(crate) struct MonitorShared {
    pin: PinId,
    label: String,
    source: Box<dyn EdgeSource>,
    running: AtomicBool,
    state: Mutex<MonitorState>,
}

impl MonitorShared {
    pub(crate) fn new(pin: PinId, label: String, source: Box<dyn EdgeSource>) -> Self {
        Self {
            pin,
            label,
            source,
            running: AtomicBool::new(false),
            state: Mutex::new(MonitorState::new()),
        }
    }

    pub(crate) fn pin(&self) -> PinId {
        self.pin
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn source(&self) -> &dyn EdgeSource {
        self.source.as_ref()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drain every pending edge. Called from the polling thread only.
    pub(crate) fn drain_edges(&self, buf: &mut [EdgeEvent]) {
        loop {
            let n = match self.source.read_events(buf) {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    let mut state = self.state.lock();
                    state.read_errors += 1;
                    if state.read_errors <= 10 || state.read_errors % 1000 == 0 {
                        warn!(
                            "GPIO {} ({}): edge read failed (#{}): {}",
                            self.pin, self.label, state.read_errors, e
                        );
                    }
                    return;
                }
            };

            // Deregistered monitors may still sit in an in-flight snapshot.
            if !self.is_running() {
                continue;
            }

            let mut state = self.state.lock();
            for event in &buf[..n] {
                let Some(reading) = state.on_edge(self.pin, *event) else {
                    continue;
                };
                if !state.seen_signal {
                    state.seen_signal = true;
                    info!(
                        "First signal on GPIO {} ({}): {} µs",
                        self.pin, self.label, reading.duration_us
                    );
                }
                state.publish(reading);
            }
        }
    }
}

/// Pulse-width monitor for one receiver channel.
///
/// Dropping the monitor stops it and releases its pin.
pub struct PwmMonitor {
    shared: Arc<MonitorShared>,
    registry: Arc<RegistryInner>,
}

impl PwmMonitor {
    pub(crate) fn new(shared: Arc<MonitorShared>, registry: Arc<RegistryInner>) -> Self {
        Self { shared, registry }
    }

    /// GPIO line.
    pub fn pin(&self) -> PinId {
        self.shared.pin
    }

    /// Feature name used in logs.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Register with the shared polling thread, starting it if needed.
    ///
    /// Starting an already running monitor is a no-op.
    pub fn start(&self) -> Result<(), StartError> {
        self.registry.start(&self.shared)
    }

    /// Deregister; joins the polling thread if this was the last monitor.
    pub fn stop(&self) {
        self.registry.stop(&self.shared);
    }

    /// Whether the monitor is registered with the polling thread.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Take the most recent unread reading.
    pub fn read(&self) -> Option<PulseReading> {
        self.shared.state.lock().latest.take()
    }

    /// Block until a reading arrives, checking every millisecond.
    ///
    /// `None` waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<PulseReading> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(reading) = self.read() {
                return Some(reading);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Rounded mean of the readings inside the averaging window.
    pub fn average(&self) -> Option<i32> {
        self.average_at(self.registry.clock().now())
    }

    /// `average()` evaluated at `now`.
    pub fn average_at(&self, now: Timestamp) -> Option<i32> {
        let state = self.shared.state.lock();
        state.window.average(now, state.avg_window_ms)
    }

    /// Set the averaging window, clamped to [10, 5000] ms. Returns the applied value.
    pub fn set_avg_window(&self, ms: u32) -> u32 {
        let ms = ms.clamp(MIN_AVG_WINDOW_MS, MAX_AVG_WINDOW_MS);
        self.shared.state.lock().avg_window_ms = ms;
        ms
    }

    /// Current averaging window [ms].
    pub fn avg_window_ms(&self) -> u32 {
        self.shared.state.lock().avg_window_ms
    }

    /// Receive every accepted reading on a bounded channel.
    ///
    /// Readings are dropped for this subscriber while its channel is full;
    /// the polling thread never blocks on a slow consumer.
    pub fn subscribe(&self, capacity: usize) -> flume::Receiver<PulseReading> {
        let (tx, rx) = flume::bounded(capacity.max(1));
        self.shared.state.lock().subscribers.push(tx);
        rx
    }

    /// `(accepted, rejected)` pulse counters.
    pub fn counters(&self) -> (u64, u64) {
        let state = self.shared.state.lock();
        (state.accepted, state.rejected)
    }
}

impl std::fmt::Debug for PwmMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PwmMonitor")
            .field("pin", &self.shared.pin)
            .field("label", &self.shared.label)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for PwmMonitor {
    fn drop(&mut self) {
        self.registry.stop(&self.shared);
        self.registry.release(&self.shared);
    }
}
