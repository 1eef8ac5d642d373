//! Event: an immutable record of something that happened to a device or cook.
//!
//! Events are published on the notification bus by the session layer and the
//! oven service. The payload is free-form JSON so subscribers outside the
//! workspace (CLI output, logs) can render it without knowing every type.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, EventId};
use crate::time::{Timestamp, now};

/// Classification of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Session connection state or cook phase changed.
    SessionStateChanged,
    /// A stage was acknowledged by the device.
    StageStarted,
    /// A preheat wait ended and the stage timer started counting.
    TimerStarted,
    /// The last stage of a program finished.
    CookCompleted,
    /// A cook was stopped on request.
    CookStopped,
    /// The device reported a fault.
    DeviceFault,
    /// A stage could not be submitted or was aborted.
    StageFailed,
    /// A discovery round completed.
    DevicesDiscovered,
}

/// A timestamped record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    /// `None` for events not tied to a single device.
    pub device_id: Option<DeviceId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(event_type: EventType, device_id: Option<DeviceId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            device_id,
            data,
            timestamp: now(),
        }
    }

    /// Shorthand for an event about one device.
    #[must_use]
    pub fn for_device(event_type: EventType, device_id: DeviceId, data: serde_json::Value) -> Self {
        Self::new(event_type, Some(device_id), data)
    }
}
