use std::sync::Arc;

use dashmap::DashMap;
use devsvc_domain::{Device, DeviceId};
use tracing::debug;

/// Concurrent index of devices by id and by name.
///
/// Values are `Arc<Device>`. `find_by_id`/`find_by_name` clone the `Arc`
/// out from under the shard lock and return it, so a caller holding a
/// handle is unaffected by a concurrent `remove`: the underlying `Device`
/// is only dropped once the last `Arc` (the map's own, plus any handles
/// still held by callers) goes away.
#[derive(Default)]
pub struct DeviceMap {
    by_id: DashMap<DeviceId, Arc<Device>>,
    name_to_id: DashMap<String, DeviceId>,
}

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device. Returns the previous value, if any.
    pub fn insert(&self, device: Device) -> Option<Arc<Device>> {
        let id = device.id.clone();
        let name = device.name.clone();
        self.name_to_id.insert(name, id.clone());
        self.by_id.insert(id, Arc::new(device))
    }

    pub fn remove_by_id(&self, id: &DeviceId) -> Option<Arc<Device>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if let Some(device) = &removed {
            self.name_to_id.remove(&device.name);
            debug!(device_id = %id, "device removed from map");
        }
        removed
    }

    pub fn find_by_id(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.by_id.get(id).map(|v| v.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Device>> {
        let id = self.name_to_id.get(name)?.clone();
        self.find_by_id(&id)
    }

    pub fn clear(&self) {
        self.by_id.clear();
        self.name_to_id.clear();
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Replace the map's contents with `devices` in one pass.
    pub fn populate_from_list(&self, devices: Vec<Device>) {
        self.clear();
        for device in devices {
            self.insert(device);
        }
    }

    /// Snapshot of every device currently held. Does not block concurrent
    /// inserts/removes during iteration; the snapshot reflects a
    /// best-effort point-in-time view.
    pub fn iterate_snapshot(&self) -> Vec<Arc<Device>> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devsvc_domain::{AdminState, OperState, ProtocolPropertiesList};

    fn device(name: &str) -> Device {
        Device {
            id: DeviceId::new(format!("id-{name}")),
            name: name.to_string(),
            admin_state: AdminState::Unlocked,
            oper_state: OperState::Enabled,
            protocols: ProtocolPropertiesList::new(),
            profile: None,
            autoevents: Vec::new(),
            labels: Vec::new(),
        }
    }

    #[test]
    fn insert_then_find_by_name_and_id() {
        let map = DeviceMap::new();
        map.insert(device("sensor-1"));
        assert!(map.find_by_name("sensor-1").is_some());
        assert!(map.find_by_id(&DeviceId::new("id-sensor-1")).is_some());
    }

    #[test]
    fn remove_drops_name_index_too() {
        let map = DeviceMap::new();
        map.insert(device("sensor-1"));
        map.remove_by_id(&DeviceId::new("id-sensor-1"));
        assert!(map.find_by_name("sensor-1").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn handle_survives_concurrent_removal() {
        let map = DeviceMap::new();
        map.insert(device("sensor-1"));
        let handle = map.find_by_name("sensor-1").unwrap();
        map.remove_by_id(&DeviceId::new("id-sensor-1"));
        assert_eq!(handle.name, "sensor-1");
    }

    #[test]
    fn populate_from_list_replaces_contents() {
        let map = DeviceMap::new();
        map.insert(device("stale"));
        map.populate_from_list(vec![device("a"), device("b")]);
        assert_eq!(map.len(), 2);
        assert!(map.find_by_name("stale").is_none());
    }

    #[test]
    fn iterate_snapshot_returns_all_devices() {
        let map = DeviceMap::new();
        map.insert(device("a"));
        map.insert(device("b"));
        let snapshot = map.iterate_snapshot();
        assert_eq!(snapshot.len(), 2);
    }
}
