//! Event bus port: publish/subscribe for session and device events.

use std::future::Future;

use ovenctl_domain::error::OvenError;
use ovenctl_domain::event::Event;

/// Publishes events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), OvenError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), OvenError>> + Send {
        (**self).publish(event)
    }
}
