//! Driver lookup by device-type tag

use std::collections::HashMap;
use std::sync::Arc;

use spectrum_core::{DeviceDriver, DeviceError};
use tracing::debug;

use crate::config::DriversConfig;
use crate::rig::RigDriver;
use crate::sensor::SensorDriver;

/// Drivers keyed by the device-type tag they serve
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DeviceDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in driver
    pub fn from_config(config: &DriversConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RigDriver::new(config.rig.clone())));
        registry.register(Arc::new(SensorDriver::new(config.sensor.clone())));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn DeviceDriver>) {
        let tag = driver.device_type().to_string();
        debug!(device = %tag, "Registered driver");
        self.drivers.insert(tag, driver);
    }

    pub fn get(&self, device: &str) -> Result<Arc<dyn DeviceDriver>, DeviceError> {
        self.drivers
            .get(device)
            .cloned()
            .ok_or_else(|| DeviceError::UnknownDevice(device.to_string()))
    }

    /// Registered tags, sorted
    pub fn device_types(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.drivers.keys().cloned().collect();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_drivers() {
        let registry = DriverRegistry::from_config(&DriversConfig::default());
        assert_eq!(registry.device_types(), vec!["rig", "sensor"]);
        assert!(registry.get("sensor").unwrap().capabilities().spans);
        assert!(!registry.get("rig").unwrap().capabilities().modes.is_empty());
    }

    #[test]
    fn test_unknown_device() {
        let registry = DriverRegistry::new();
        assert!(matches!(
            registry.get("ams"),
            Err(DeviceError::UnknownDevice(ref d)) if d == "ams"
        ));
    }
}
