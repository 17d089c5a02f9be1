//! Gun FX.
//!
//! - `RateTable` - Threshold-ordered rates of fire
//! - `GunSettings` - Reconfigurable parameters
//! - `GunFireController` - Idle / Firing / Stopping state machine
//! - `GunFx` - Controller running on its own thread

mod controller;
mod rates;
mod runner;
mod settings;

pub use controller::{GunFireController, GunFireState, GunInputs, GunServos, PulseInput};
pub use rates::RateTable;
pub use runner::GunFx;
pub use settings::GunSettings;
