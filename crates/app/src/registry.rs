//! In-memory registry of discovered devices.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use ovenctl_domain::device::{Device, DeviceState};
use ovenctl_domain::id::DeviceId;

use crate::ports::DeviceReport;

/// Last-known view of every discovered device. Never persisted.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<DeviceId, Device>>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace discovered devices.
    pub fn upsert_all(&self, devices: impl IntoIterator<Item = Device>) {
        let mut map = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        for device in devices {
            map.insert(device.id.clone(), device);
        }
    }

    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<Device> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// All devices in id order.
    #[must_use]
    pub fn list(&self) -> Vec<Device> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Refresh state and temperature from a status report. Unknown ids are ignored.
    pub fn apply_report(&self, id: &DeviceId, report: &DeviceReport) {
        let mut map = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(device) = map.get_mut(id) {
            device.state = report.state;
            if report.current_celsius.is_some() {
                device.current_temperature = report.current_celsius;
            }
        }
    }

    pub fn set_state(&self, id: &DeviceId, state: DeviceState) {
        let mut map = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(device) = map.get_mut(id) {
            device.state = state;
        }
    }
}
