//! Virtual adapter errors.

use ovenctl_app::ports::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VirtualError {
    #[error("virtual channel is not connected")]
    NotConnected,

    /// A failure scheduled through the fault-injection setters.
    #[error("injected {operation} failure")]
    Injected { operation: &'static str },
}

impl VirtualError {
    /// Map to the port-level error; every virtual failure is transient.
    #[must_use]
    pub fn into_transport(self) -> TransportError {
        match self {
            Self::NotConnected => TransportError::NotConnected,
            Self::Injected {
                operation: "connect",
            } => TransportError::Connect(self.to_string()),
            Self::Injected { .. } => TransportError::Send(self.to_string()),
        }
    }
}

impl From<VirtualError> for TransportError {
    fn from(error: VirtualError) -> Self {
        error.into_transport()
    }
}
