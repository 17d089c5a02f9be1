//! Output driver implementations.
//!
//! - [`simulation`] - Records commanded outputs; no hardware
//! - [`gpio`] - On-board GPIO pins and hardware PWM (rppal)
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `OutputDriver` from `helifx_common::fx::driver`
//! 3. Register its factory in `register_all_drivers()`

pub mod gpio;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register every built-in driver.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
    registry.register("gpio", gpio::create_driver);
}
