//! Capture registry and the shared polling thread.
//!
//! The registry owns pin claims and the bounded set of active monitors.
//! One thread waits on every active monitor's edge descriptor at once;
//! each iteration it copies the active set, so registration never waits
//! on an in-progress `poll`.

use super::monitor::{MonitorShared, PwmMonitor};
use crate::clock::Clock;
use crate::error::{CreateError, StartError};
use crate::gpio::{EdgeEvent, EdgeProvider};
use helifx_common::consts::{EDGE_POLL_TIMEOUT_MS, MAX_GPIO_PIN, MAX_PWM_MONITORS, is_reserved_pin};
use helifx_common::fx::types::PinId;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type ActiveSet = heapless::Vec<Arc<MonitorShared>, MAX_PWM_MONITORS>;

/// Edges read per `read_events` call.
const EDGE_BATCH: usize = 32;

/// Self-pipe used to interrupt `poll` when the active set changes.
#[derive(Debug)]
struct Waker {
    reader: UnixStream,
    writer: UnixStream,
}

impl Waker {
    fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self { reader, writer })
    }

    fn wake(&self) {
        // A full buffer means a wake-up is already pending.
        let _ = (&self.writer).write(&[1]);
    }

    fn drain(&self) {
        let mut sink = [0u8; 64];
        while matches!((&self.reader).read(&mut sink), Ok(n) if n > 0) {}
    }
}

/// Running polling thread.
struct PollThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub(crate) struct RegistryInner {
    provider: Arc<dyn EdgeProvider>,
    clock: Arc<dyn Clock>,
    claimed: Mutex<HashSet<PinId>>,
    active: Arc<Mutex<ActiveSet>>,
    waker: Arc<Waker>,
    /// Serializes start/stop so thread spawn and join never interleave.
    poller: Mutex<Option<PollThread>>,
}

impl RegistryInner {
    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn start(&self, monitor: &Arc<MonitorShared>) -> Result<(), StartError> {
        let mut poller = self.poller.lock();

        let count = {
            let mut active = self.active.lock();
            if active.iter().any(|m| Arc::ptr_eq(m, monitor)) {
                return Ok(());
            }
            active
                .push(Arc::clone(monitor))
                .map_err(|_| StartError::Capacity {
                    max: MAX_PWM_MONITORS,
                })?;
            active.len()
        };
        monitor.set_running(true);

        if poller.is_none() {
            match self.spawn_poll_thread() {
                Ok(thread) => *poller = Some(thread),
                Err(e) => {
                    self.active.lock().retain(|m| !Arc::ptr_eq(m, monitor));
                    monitor.set_running(false);
                    error!("Failed to spawn PWM polling thread: {}", e);
                    return Err(StartError::Thread(e.to_string()));
                }
            }
        } else {
            self.waker.wake();
        }

        info!(
            "PWM monitor started on GPIO {} ({}), {} active",
            monitor.pin(),
            monitor.label(),
            count
        );
        Ok(())
    }

    pub(crate) fn stop(&self, monitor: &Arc<MonitorShared>) {
        let mut poller = self.poller.lock();

        let remaining = {
            let mut active = self.active.lock();
            let before = active.len();
            active.retain(|m| !Arc::ptr_eq(m, monitor));
            if active.len() == before {
                return;
            }
            active.len()
        };
        monitor.set_running(false);

        if remaining == 0 {
            if let Some(thread) = poller.take() {
                thread.running.store(false, Ordering::SeqCst);
                self.waker.wake();
                if thread.handle.join().is_err() {
                    error!("PWM polling thread panicked");
                }
            }
        } else {
            self.waker.wake();
        }

        info!(
            "PWM monitor stopped on GPIO {} ({}), {} active",
            monitor.pin(),
            monitor.label(),
            remaining
        );
    }

    pub(crate) fn release(&self, monitor: &MonitorShared) {
        self.claimed.lock().remove(&monitor.pin());
        debug!("GPIO {} ({}) released", monitor.pin(), monitor.label());
    }

    fn spawn_poll_thread(&self) -> io::Result<PollThread> {
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = Arc::clone(&running);
            let active = Arc::clone(&self.active);
            let waker = Arc::clone(&self.waker);
            std::thread::Builder::new()
                .name("pwm-poll".to_string())
                .spawn(move || poll_loop(&active, &waker, &running))?
        };
        Ok(PollThread { running, handle })
    }
}

fn poll_loop(active: &Mutex<ActiveSet>, waker: &Waker, running: &AtomicBool) {
    info!("PWM polling thread started");
    let mut events = [EdgeEvent::default(); EDGE_BATCH];

    while running.load(Ordering::SeqCst) {
        let snapshot: ActiveSet = active.lock().clone();

        let mut fds: heapless::Vec<PollFd<'_>, { MAX_PWM_MONITORS + 1 }> = heapless::Vec::new();
        let _ = fds.push(PollFd::new(waker.reader.as_fd(), PollFlags::POLLIN));
        for monitor in &snapshot {
            let _ = fds.push(PollFd::new(monitor.source().as_fd(), PollFlags::POLLIN));
        }

        match poll(&mut fds, EDGE_POLL_TIMEOUT_MS) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("PWM poll failed: {}", e);
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        }

        let ready: heapless::Vec<bool, { MAX_PWM_MONITORS + 1 }> = fds
            .iter()
            .map(|fd| fd.revents().is_some_and(|r| !r.is_empty()))
            .collect();
        drop(fds);

        if ready.first().copied().unwrap_or(false) {
            waker.drain();
        }
        // Handle-registration order, not global edge order.
        for (monitor, _) in snapshot.iter().zip(ready.iter().skip(1)).filter(|(_, r)| **r) {
            monitor.drain_edges(&mut events);
        }
    }

    info!("PWM polling thread stopped");
}

/// Owner of pin claims and the active monitor set.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct CaptureRegistry {
    inner: Arc<RegistryInner>,
}

impl CaptureRegistry {
    /// Create a registry drawing edge sources from `provider`.
    pub fn new(provider: Arc<dyn EdgeProvider>, clock: Arc<dyn Clock>) -> Result<Self, CreateError> {
        let waker = Waker::new().map_err(|e| CreateError::Resource(format!("wake pipe: {e}")))?;
        Ok(Self {
            inner: Arc::new(RegistryInner {
                provider,
                clock,
                claimed: Mutex::new(HashSet::new()),
                active: Arc::new(Mutex::new(heapless::Vec::new())),
                waker: Arc::new(waker),
                poller: Mutex::new(None),
            }),
        })
    }

    /// Claim `pin` and request edge notification on it.
    ///
    /// # Errors
    /// - `CreateError::PinUnavailable` if the pin is out of range, reserved or claimed
    /// - `CreateError::Resource` if the edge source cannot be obtained
    pub fn create(&self, pin: PinId, label: &str) -> Result<PwmMonitor, CreateError> {
        if pin > MAX_GPIO_PIN {
            return Err(CreateError::PinUnavailable {
                pin,
                reason: format!("out of range (0-{MAX_GPIO_PIN})"),
            });
        }
        if is_reserved_pin(pin) {
            return Err(CreateError::PinUnavailable {
                pin,
                reason: "reserved for the audio HAT".to_string(),
            });
        }

        let source = {
            let mut claimed = self.inner.claimed.lock();
            if claimed.contains(&pin) {
                return Err(CreateError::PinUnavailable {
                    pin,
                    reason: "already claimed".to_string(),
                });
            }
            let source = self.inner.provider.request_edges(pin, label)?;
            claimed.insert(pin);
            source
        };

        info!("PWM monitor created on GPIO {} ({})", pin, label);
        let shared = Arc::new(MonitorShared::new(pin, label.to_string(), source));
        Ok(PwmMonitor::new(shared, Arc::clone(&self.inner)))
    }

    /// Monitors currently registered with the polling thread.
    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Whether the polling thread is alive.
    pub fn is_polling(&self) -> bool {
        self.inner.poller.lock().is_some()
    }

    /// Time source used for averaging.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }
}

impl std::fmt::Debug for CaptureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureRegistry")
            .field("active", &self.active_count())
            .finish()
    }
}
