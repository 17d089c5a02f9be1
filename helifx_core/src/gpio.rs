//! GPIO edge sources.
//!
//! An [`EdgeProvider`] hands out one [`EdgeSource`] per input pin. Each source
//! exposes a pollable descriptor that becomes readable when edge events are
//! pending, so one thread can wait on every active pin at once.
//!
//! - [`cdev`] - Linux GPIO character device (uAPI v2)
//! - [`simulation`] - In-process edges for tests and bench runs

pub mod cdev;
pub mod simulation;

use crate::error::CreateError;
use helifx_common::fx::types::{PinId, Timestamp};
use std::io;
use std::os::fd::AsFd;

/// Edge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeKind {
    /// Low to high
    #[default]
    Rising,
    /// High to low
    Falling,
}

/// One timestamped edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeEvent {
    /// Direction
    pub kind: EdgeKind,
    /// CLOCK_MONOTONIC instant of the edge
    pub timestamp: Timestamp,
}

impl EdgeEvent {
    /// Rising edge at `timestamp`.
    pub const fn rising(timestamp: Timestamp) -> Self {
        Self {
            kind: EdgeKind::Rising,
            timestamp,
        }
    }

    /// Falling edge at `timestamp`.
    pub const fn falling(timestamp: Timestamp) -> Self {
        Self {
            kind: EdgeKind::Falling,
            timestamp,
        }
    }
}

/// Pollable stream of edge events for one pin.
///
/// The descriptor returned by `as_fd()` must become readable (`POLLIN`)
/// whenever `read_events()` would return events.
pub trait EdgeSource: AsFd + Send + Sync {
    /// Move pending events into `buf` without blocking.
    ///
    /// Returns the number written; `Ok(0)` means nothing is pending.
    fn read_events(&self, buf: &mut [EdgeEvent]) -> io::Result<usize>;
}

/// Factory for per-pin edge sources.
pub trait EdgeProvider: Send + Sync {
    /// Request both-edge notification on `pin`, tagged with `label`.
    fn request_edges(&self, pin: PinId, label: &str) -> Result<Box<dyn EdgeSource>, CreateError>;
}
