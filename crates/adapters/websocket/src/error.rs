//! WebSocket adapter error types.

use std::time::Duration;

use ovenctl_app::ports::TransportError;
use tokio_tungstenite::tungstenite;

/// Errors specific to the WebSocket adapter.
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("no access token configured")]
    MissingToken,

    #[error("invalid WebSocket URL")]
    Url(#[source] url::ParseError),

    #[error("WebSocket handshake failed")]
    Connect(#[source] tungstenite::Error),

    #[error("WebSocket handshake timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("WebSocket not connected")]
    NotConnected,

    #[error("WebSocket send failed")]
    Send(#[source] tungstenite::Error),

    #[error("failed to encode command")]
    Encode(#[source] serde_json::Error),
}

impl WebSocketError {
    /// Convert into a [`TransportError`] for propagation across the port
    /// boundary. Only encoding failures are permanent.
    #[must_use]
    pub fn into_transport(self) -> TransportError {
        match self {
            Self::NotConnected => TransportError::NotConnected,
            Self::Send(_) => TransportError::Send(describe(&self)),
            Self::Encode(_) => TransportError::Encode(describe(&self)),
            Self::MissingToken | Self::Url(_) | Self::Connect(_) | Self::ConnectTimeout(_) => {
                TransportError::Connect(describe(&self))
            }
        }
    }
}

impl From<WebSocketError> for TransportError {
    fn from(err: WebSocketError) -> Self {
        err.into_transport()
    }
}

/// `error: source` chain on one line.
fn describe(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
