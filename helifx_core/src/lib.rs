//! # HeliFX Core Library
//!
//! Real-time control core of the HeliFX scale-model effects controller.
//!
//! # Module Structure
//!
//! - [`clock`] - Monotonic edge clock
//! - [`gpio`] - Edge sources (GPIO character device, simulation)
//! - [`capture`] - PWM capture monitors and the shared polling thread
//! - [`servo`] - Servo motion profiler
//! - [`gun`] - Gun fire controller
//! - [`driver_registry`] / [`drivers`] - Output transports
//! - [`core`] - Runtime wiring
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          helifx_core                              │
//! │  ┌──────────────┐   ┌────────────────┐   ┌─────────────────────┐  │
//! │  │ EdgeProvider │──►│ CaptureRegistry│──►│ PwmMonitor (×≤8)    │  │
//! │  │ (cdev / sim) │   │ (pwm-poll thr.)│   └──────────┬──────────┘  │
//! │  └──────────────┘   └────────────────┘              │ average()   │
//! │                                                     ▼             │
//! │  ┌──────────────┐   set_input    ┌─────────────────────────────┐  │
//! │  │ServoProfiler │◄───────────────│ GunFireController (gun-fx)  │  │
//! │  │ (servo thr.) │───output()────►│ Idle / Firing / Stopping    │  │
//! │  └──────────────┘                └──────────────┬──────────────┘  │
//! │                                                 ▼                 │
//! │                                  ┌─────────────────────────────┐  │
//! │                                  │ OutputDriver (trait object) │  │
//! │                                  └─────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod capture;
pub mod clock;
pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod error;
pub mod gpio;
pub mod gun;
pub mod servo;

// Re-export key types for convenience
pub use crate::core::HeliFxCore;
pub use crate::driver_registry::DriverRegistry;
pub use crate::error::{CoreError, CreateError, ServoError, StartError};
