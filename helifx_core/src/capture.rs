//! PWM capture.
//!
//! Turns GPIO edge activity into calibrated pulse-width readings.
//!
//! - `CaptureRegistry` - Pin claims, bounded active set, shared polling thread
//! - `PwmMonitor` - Per-pin readings, windowed average, subscriptions
//! - `CaptureWindow` - Fixed-capacity ring of recent samples

mod monitor;
mod registry;
mod window;

pub use monitor::PwmMonitor;
pub use registry::CaptureRegistry;
pub use window::CaptureWindow;
