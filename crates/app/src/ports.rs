//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the session layer and the
//! transport adapters can depend on them without creating circular dependencies.

pub mod event_bus;
pub mod transport;

pub use event_bus::EventPublisher;
pub use transport::{
    CommandChannel, CommandEnvelope, DeviceEvent, DeviceReport, Inbound, OvenCommand,
    TransportError,
};
