//! Servo motion profiling.
//!
//! - `MotionProfile` - Speed- and acceleration-limited integrator
//! - `ServoProfiler` - One axis driven by its own control thread
//! - `ServoAxisState` - Target, output and velocity snapshot

mod profile;
mod profiler;

pub use profile::{MotionProfile, ServoAxisState};
pub use profiler::ServoProfiler;
