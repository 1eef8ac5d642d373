//! In-process notification bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use ovenctl_domain::error::{ConnectionError, OvenError};
use ovenctl_domain::event::{Event, EventType};
use ovenctl_domain::id::DeviceId;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Clones share the same channel.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Event>,
}

impl NotificationBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventPublisher for NotificationBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), OvenError>> + Send {
        // send only fails without receivers
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

/// How a cook on one device ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookOutcome {
    Completed,
    Stopped,
    StageFailed { stage_index: usize, reason: String },
    Faulted { message: String },
}

/// Wait on `events` until the cook on `device_id` ends.
///
/// Subscribe before starting the cook so no event is missed.
///
/// # Errors
///
/// Returns [`OvenError::Connection`] when the bus shuts down or the session
/// reports a disconnect first.
pub async fn wait_for_cook_end(
    events: &mut broadcast::Receiver<Event>,
    device_id: &DeviceId,
) -> Result<CookOutcome, OvenError> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification receiver lagged");
                continue;
            }
            Err(RecvError::Closed) => {
                return Err(ConnectionError {
                    device_id: Some(device_id.clone()),
                    attempts: 0,
                    reason: "notification bus closed".to_string(),
                }
                .into());
            }
        };
        if event.device_id.as_ref() != Some(device_id) {
            continue;
        }
        let outcome = match event.event_type {
            EventType::CookCompleted => CookOutcome::Completed,
            EventType::CookStopped => CookOutcome::Stopped,
            EventType::StageFailed => CookOutcome::StageFailed {
                stage_index: event.data["stage_index"]
                    .as_u64()
                    .and_then(|index| usize::try_from(index).ok())
                    .unwrap_or_default(),
                reason: text(&event.data["reason"]),
            },
            EventType::DeviceFault => CookOutcome::Faulted {
                message: text(&event.data["message"]),
            },
            EventType::SessionStateChanged if event.data["to"] == "disconnected" => {
                return Err(ConnectionError {
                    device_id: Some(device_id.clone()),
                    attempts: 0,
                    reason: "device disconnected during cook".to_string(),
                }
                .into());
            }
            _ => continue,
        };
        return Ok(outcome);
    }
}

fn text(value: &serde_json::Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}
