//! Registry of output drivers.
//!
//! Maps driver names from `[gpio] output_driver` to factories. Built at
//! startup and handed to `HeliFxCore`; there is no global state.

use helifx_common::fx::driver::{DriverFactory, OutputDriver, OutputError};
use std::collections::HashMap;

/// Registry of available output drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory. A second registration under the same name replaces the first.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.insert(name, factory).is_some() {
            tracing::warn!("Output driver '{}' re-registered", name);
        }
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `OutputError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn OutputDriver>, OutputError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| OutputError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulationOutput;

    fn create_test_driver() -> Box<dyn OutputDriver> {
        Box::new(SimulationOutput::new())
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DriverRegistry::new();
        reg.register("test_driver", create_test_driver);

        let driver = reg.create_driver("test_driver").expect("should create");
        assert_eq!(driver.name(), "simulation");
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create_driver("serial");
        assert!(matches!(result, Err(OutputError::DriverNotFound(_))));
    }

    #[test]
    fn builtin_drivers_listed() {
        let reg = DriverRegistry::with_builtin();
        assert_eq!(reg.list_drivers(), vec!["gpio", "simulation"]);
        assert_eq!(reg.create_driver("gpio").unwrap().name(), "gpio");
    }
}
