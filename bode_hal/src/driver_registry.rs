//! Driver registry for bench drivers.
//!
//! Maps driver names to factories. Built once at startup and passed where
//! needed; there is no global registry.

use bode_common::driver::{BenchDriver, DriverFactory};
use bode_common::instrument::InstrumentError;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

/// Bench drivers selectable with `--driver`, keyed by name.
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Registry without any driver.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Add `factory` under `name`.
    ///
    /// # Panics
    /// Registering the same name twice is a programming error and panics.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        match self.factories.entry(name) {
            Entry::Occupied(_) => panic!("bench driver '{name}' registered twice"),
            Entry::Vacant(slot) => {
                slot.insert(factory);
                debug!("Registered bench driver '{name}'");
            }
        }
    }

    /// Factory registered under `name`.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Instantiate the driver registered under `name`.
    ///
    /// # Errors
    /// `InstrumentError::DriverNotFound`, naming the registered drivers.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn BenchDriver>, InstrumentError> {
        let factory = self.get_factory(name).ok_or_else(|| {
            InstrumentError::DriverNotFound(format!(
                "{name} (available: {})",
                self.list_drivers().join(", ")
            ))
        })?;
        Ok(factory())
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
