//! Simulated edge sources.
//!
//! Each requested pin gets a socket pair: the source end is what the polling
//! thread waits on, the [`SimulatedLine`] end lets tests and the bench binary
//! inject edges with exact timestamps.

use super::{EdgeEvent, EdgeProvider, EdgeSource};
use crate::error::CreateError;
use helifx_common::fx::types::{PinId, Timestamp};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type EventQueue = Arc<Mutex<VecDeque<EdgeEvent>>>;

/// Injection handle for one simulated pin.
#[derive(Debug, Clone)]
pub struct SimulatedLine {
    pin: PinId,
    queue: EventQueue,
    wake: Arc<UnixStream>,
}

impl SimulatedLine {
    /// Pin this line feeds.
    pub fn pin(&self) -> PinId {
        self.pin
    }

    /// Queue one edge and wake the poller.
    pub fn edge(&self, event: EdgeEvent) {
        self.queue.lock().push_back(event);
        // A full socket buffer is already readable; dropping the byte is harmless.
        let _ = (&*self.wake).write(&[1]);
    }

    /// Queue a rising edge at `rise` and its falling edge `width` later.
    pub fn pulse(&self, rise: Timestamp, width: Duration) {
        self.edge(EdgeEvent::rising(rise));
        self.edge(EdgeEvent::falling(rise + width));
    }

    /// Queue a pulse of `width_us` microseconds.
    pub fn pulse_us(&self, rise: Timestamp, width_us: u64) {
        self.pulse(rise, Duration::from_micros(width_us));
    }
}

/// Source end of a simulated pin.
#[derive(Debug)]
pub struct SimulatedEdgeSource {
    queue: EventQueue,
    readable: UnixStream,
}

impl AsFd for SimulatedEdgeSource {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.readable.as_fd()
    }
}

impl EdgeSource for SimulatedEdgeSource {
    fn read_events(&self, buf: &mut [EdgeEvent]) -> io::Result<usize> {
        let mut sink = [0u8; 64];
        loop {
            match (&self.readable).read(&mut sink) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let mut queue = self.queue.lock();
        let mut count = 0;
        while count < buf.len() {
            match queue.pop_front() {
                Some(event) => {
                    buf[count] = event;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

/// In-process GPIO bank.
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    lines: Mutex<HashMap<PinId, SimulatedLine>>,
    broken: Mutex<HashSet<PinId>>,
}

impl SimulatedGpio {
    /// Empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Injection handle of a requested pin.
    pub fn line(&self, pin: PinId) -> Option<SimulatedLine> {
        self.lines.lock().get(&pin).cloned()
    }

    /// Make future requests for `pin` fail with `CreateError::Resource`.
    pub fn break_pin(&self, pin: PinId) {
        self.broken.lock().insert(pin);
    }
}

impl EdgeProvider for SimulatedGpio {
    fn request_edges(&self, pin: PinId, label: &str) -> Result<Box<dyn EdgeSource>, CreateError> {
        if self.broken.lock().contains(&pin) {
            return Err(CreateError::Resource(format!("GPIO {pin}: simulated failure")));
        }

        let (readable, wake) =
            UnixStream::pair().map_err(|e| CreateError::Resource(e.to_string()))?;
        readable
            .set_nonblocking(true)
            .and_then(|()| wake.set_nonblocking(true))
            .map_err(|e| CreateError::Resource(e.to_string()))?;

        let queue = EventQueue::default();
        let line = SimulatedLine {
            pin,
            queue: Arc::clone(&queue),
            wake: Arc::new(wake),
        };
        self.lines.lock().insert(pin, line);
        debug!("Simulated GPIO {} requested as '{}'", pin, label);

        Ok(Box::new(SimulatedEdgeSource { queue, readable }))
    }
}
