//! Linux GPIO character device access (uAPI v2).
//!
//! Lines are requested from `/dev/gpiochipN` with `GPIO_V2_GET_LINE_IOCTL`.
//! Input lines are configured for both edges and read as 48-byte
//! `gpio_v2_line_event` records stamped with CLOCK_MONOTONIC. The line fd
//! joins the capture thread's poll set directly.

use super::{EdgeEvent, EdgeKind, EdgeProvider, EdgeSource};
use crate::error::CreateError;
use helifx_common::fx::types::{PinId, Timestamp};
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use static_assertions::assert_eq_size;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const GPIO_V2_LINES_MAX: usize = 64;
const GPIO_MAX_NAME_SIZE: usize = 32;
const GPIO_V2_LINE_NUM_ATTRS_MAX: usize = 10;

const GPIO_V2_LINE_FLAG_INPUT: u64 = 1 << 2;
const GPIO_V2_LINE_FLAG_EDGE_RISING: u64 = 1 << 4;
const GPIO_V2_LINE_FLAG_EDGE_FALLING: u64 = 1 << 5;

const GPIO_V2_LINE_EVENT_RISING_EDGE: u32 = 1;
const GPIO_V2_LINE_EVENT_FALLING_EDGE: u32 = 2;

/// Size of one `gpio_v2_line_event` record.
const LINE_EVENT_SIZE: usize = 48;
/// Records read per `read(2)`.
const EVENTS_PER_READ: usize = 16;
/// Kernel-side event queue depth per line.
const EVENT_BUFFER_SIZE: u32 = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct GpioV2LineAttribute {
    id: u32,
    padding: u32,
    value: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct GpioV2LineConfigAttribute {
    attr: GpioV2LineAttribute,
    mask: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct GpioV2LineConfig {
    flags: u64,
    num_attrs: u32,
    padding: [u32; 5],
    attrs: [GpioV2LineConfigAttribute; GPIO_V2_LINE_NUM_ATTRS_MAX],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct GpioV2LineRequest {
    offsets: [u32; GPIO_V2_LINES_MAX],
    consumer: [u8; GPIO_MAX_NAME_SIZE],
    config: GpioV2LineConfig,
    num_lines: u32,
    event_buffer_size: u32,
    padding: [u32; 5],
    fd: i32,
}

assert_eq_size!(GpioV2LineConfigAttribute, [u8; 24]);
assert_eq_size!(GpioV2LineRequest, [u8; 592]);

nix::ioctl_readwrite!(gpio_v2_get_line, 0xB4, 0x07, GpioV2LineRequest);

impl GpioV2LineRequest {
    /// Single-line request.
    fn single(offset: u32, flags: u64, consumer: &str, event_buffer_size: u32) -> Self {
        let mut req = Self {
            offsets: [0; GPIO_V2_LINES_MAX],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            config: GpioV2LineConfig {
                flags,
                num_attrs: 0,
                padding: [0; 5],
                attrs: [GpioV2LineConfigAttribute::default(); GPIO_V2_LINE_NUM_ATTRS_MAX],
            },
            num_lines: 1,
            event_buffer_size,
            padding: [0; 5],
            fd: -1,
        };
        req.offsets[0] = offset;
        // Leave room for the NUL terminator.
        let name = consumer.as_bytes();
        let len = name.len().min(GPIO_MAX_NAME_SIZE - 1);
        req.consumer[..len].copy_from_slice(&name[..len]);
        req
    }
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Decode one `gpio_v2_line_event` record.
fn parse_event(record: &[u8]) -> Option<EdgeEvent> {
    let timestamp_ns = u64::from_ne_bytes(record.get(0..8)?.try_into().ok()?);
    let id = u32::from_ne_bytes(record.get(8..12)?.try_into().ok()?);
    let kind = match id {
        GPIO_V2_LINE_EVENT_RISING_EDGE => EdgeKind::Rising,
        GPIO_V2_LINE_EVENT_FALLING_EDGE => EdgeKind::Falling,
        _ => return None,
    };
    Some(EdgeEvent {
        kind,
        timestamp: Timestamp::from_nanos(timestamp_ns),
    })
}

/// An open GPIO chip.
#[derive(Debug)]
pub struct GpioChip {
    path: PathBuf,
    file: File,
}

impl GpioChip {
    /// Open the character device at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        info!("Opened GPIO chip {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn request_line(&self, pin: PinId, flags: u64, label: &str) -> io::Result<OwnedFd> {
        let mut req = GpioV2LineRequest::single(pin, flags, label, EVENT_BUFFER_SIZE);
        // SAFETY: `req` is a correctly laid out `gpio_v2_line_request` (size checked above)
        // and lives across the call.
        unsafe { gpio_v2_get_line(self.file.as_raw_fd(), &mut req) }.map_err(io::Error::from)?;
        // SAFETY: on success the kernel stores a fresh descriptor we now own.
        let fd = unsafe { OwnedFd::from_raw_fd(req.fd) };
        debug!("Requested GPIO {} as '{}' (flags={:#x})", pin, label, flags);
        Ok(fd)
    }

    /// Request `pin` as an input reporting both edges.
    pub fn request_edges(&self, pin: PinId, label: &str) -> io::Result<CdevEdgeSource> {
        let fd = self.request_line(
            pin,
            GPIO_V2_LINE_FLAG_INPUT | GPIO_V2_LINE_FLAG_EDGE_RISING | GPIO_V2_LINE_FLAG_EDGE_FALLING,
            label,
        )?;
        set_nonblocking(&fd)?;
        Ok(CdevEdgeSource {
            pin,
            file: File::from(fd),
        })
    }
}

/// Edge events of one input line.
#[derive(Debug)]
pub struct CdevEdgeSource {
    pin: PinId,
    file: File,
}

impl CdevEdgeSource {
    /// Line offset.
    pub fn pin(&self) -> PinId {
        self.pin
    }
}

impl AsFd for CdevEdgeSource {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl EdgeSource for CdevEdgeSource {
    fn read_events(&self, buf: &mut [EdgeEvent]) -> io::Result<usize> {
        let max = buf.len().min(EVENTS_PER_READ);
        if max == 0 {
            return Ok(0);
        }
        let mut raw = [0u8; LINE_EVENT_SIZE * EVENTS_PER_READ];
        let n = match (&self.file).read(&mut raw[..max * LINE_EVENT_SIZE]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut count = 0;
        for record in raw[..n].chunks_exact(LINE_EVENT_SIZE) {
            if let Some(event) = parse_event(record) {
                buf[count] = event;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Edge provider backed by a GPIO chip.
#[derive(Debug)]
pub struct CdevEdgeProvider {
    chip: GpioChip,
}

impl CdevEdgeProvider {
    /// Open the chip at `path`.
    pub fn open(path: &Path) -> Result<Self, CreateError> {
        let chip = GpioChip::open(path)
            .map_err(|e| CreateError::Resource(format!("{}: {e}", path.display())))?;
        Ok(Self { chip })
    }
}

impl EdgeProvider for CdevEdgeProvider {
    fn request_edges(&self, pin: PinId, label: &str) -> Result<Box<dyn EdgeSource>, CreateError> {
        match self.chip.request_edges(pin, label) {
            Ok(source) => Ok(Box::new(source)),
            Err(e) if e.raw_os_error() == Some(libc::EBUSY) => Err(CreateError::PinUnavailable {
                pin,
                reason: "line busy (claimed by another consumer)".to_string(),
            }),
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) => Err(CreateError::PinUnavailable {
                pin,
                reason: format!("no such line on {}", self.chip.path().display()),
            }),
            Err(e) => Err(CreateError::Resource(format!("GPIO {pin}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp_ns: u64, id: u32) -> [u8; LINE_EVENT_SIZE] {
        let mut raw = [0u8; LINE_EVENT_SIZE];
        raw[0..8].copy_from_slice(&timestamp_ns.to_ne_bytes());
        raw[8..12].copy_from_slice(&id.to_ne_bytes());
        raw[12..16].copy_from_slice(&17u32.to_ne_bytes());
        raw
    }

    #[test]
    fn test_parse_event_kinds() {
        let rising = parse_event(&record(1_000, GPIO_V2_LINE_EVENT_RISING_EDGE)).unwrap();
        assert_eq!(rising, EdgeEvent::rising(Timestamp::from_nanos(1_000)));

        let falling = parse_event(&record(2_500, GPIO_V2_LINE_EVENT_FALLING_EDGE)).unwrap();
        assert_eq!(falling, EdgeEvent::falling(Timestamp::from_nanos(2_500)));

        assert!(parse_event(&record(3_000, 7)).is_none());
        assert!(parse_event(&[0u8; 4]).is_none());
    }

    #[test]
    fn test_request_layout() {
        let req = GpioV2LineRequest::single(
            17,
            GPIO_V2_LINE_FLAG_INPUT | GPIO_V2_LINE_FLAG_EDGE_RISING,
            "a-very-long-consumer-label-that-overflows",
            EVENT_BUFFER_SIZE,
        );
        assert_eq!(req.offsets[0], 17);
        assert_eq!(req.num_lines, 1);
        assert_eq!(req.config.flags, 0b1_0100);
        assert_eq!(req.consumer[GPIO_MAX_NAME_SIZE - 1], 0);
        assert_eq!(&req.consumer[..6], b"a-very");
    }

    #[test]
    fn test_set_nonblocking_marks_fd() {
        let (rx, _tx) = nix::unistd::pipe().unwrap();
        set_nonblocking(&rx).unwrap();
        let flags = OFlag::from_bits_truncate(fcntl(&rx, FcntlArg::F_GETFL).unwrap());
        assert!(flags.contains(OFlag::O_NONBLOCK));

        let mut buf = [0u8; 1];
        let err = File::from(rx).read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_open_missing_chip_is_resource_error() {
        let err = CdevEdgeProvider::open(Path::new("/nonexistent/gpiochip9")).unwrap_err();
        assert!(matches!(err, CreateError::Resource(_)));
    }
}
