//! Device presence registry.
//!
//! Tracks which devices the backend reports as connected. Lookups use the
//! exact `deviceId` the backend sent.

use std::collections::BTreeMap;

use sensorlink_types::DeviceRecord;

/// What a presence message did to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceChange {
    /// A device was added or its record replaced.
    Registered(DeviceRecord),
    /// A device was removed. `known` is false if it was not registered.
    Disconnected { device_id: String, known: bool },
    /// The whole set was replaced.
    Listed { count: usize },
}

/// Currently connected devices, keyed by exact device id.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device record.
    pub fn register(&mut self, device: DeviceRecord) {
        self.devices.insert(device.device_id.clone(), device);
    }

    /// Remove a device. Returns the removed record, if any.
    pub fn disconnect(&mut self, device_id: &str) -> Option<DeviceRecord> {
        self.devices.remove(device_id)
    }

    /// Replace every record with `devices`.
    pub fn replace(&mut self, devices: Vec<DeviceRecord>) {
        self.devices = devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
    }

    /// Look up a device.
    pub fn get(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices.get(device_id)
    }

    /// All devices ordered by id.
    pub fn list(&self) -> Vec<DeviceRecord> {
        self.devices.values().cloned().collect()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, name: &str) -> DeviceRecord {
        let mut record = DeviceRecord::new(id);
        record.name = Some(name.to_string());
        record
    }

    #[test]
    fn test_register_upserts() {
        let mut registry = DeviceRegistry::new();
        registry.register(named("cam-1", "Dock"));
        registry.register(named("cam-1", "Gate"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("cam-1").unwrap().display_name(), "Gate");
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut registry = DeviceRegistry::new();
        registry.register(DeviceRecord::new("CAM-1"));
        assert!(registry.get("cam-1").is_none());
        assert!(registry.disconnect("cam-1").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disconnect_and_replace() {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![DeviceRecord::new("a"), DeviceRecord::new("b")]);
        assert_eq!(registry.len(), 2);

        assert!(registry.disconnect("a").is_some());
        assert!(registry.disconnect("a").is_none());

        registry.register(DeviceRecord::new("c"));
        let ids: Vec<String> = registry.list().into_iter().map(|d| d.device_id).collect();
        assert_eq!(ids, vec!["b", "c"]);

        // A list replaces, it does not merge.
        registry.replace(vec![]);
        assert!(registry.is_empty());
    }
}
