//! # ovenctl-adapter-websocket
//!
//! [`CommandChannel`] over the oven vendor's cloud WebSocket.
//!
//! One connection serves every oven on the account. The server pushes the
//! device list (`EVENT_APO_WIFI_LIST`) right after the handshake and state
//! notifications as they happen; commands are answered by `RESPONSE` frames
//! carrying the request id. A background reader task decodes inbound frames
//! and fans them out on a [`broadcast`] channel.
//!
//! The channel never reconnects on its own. When the socket drops it
//! publishes [`Inbound::Closed`] and later sends fail with
//! [`TransportError::NotConnected`]; the caller's retry policy reconnects.
//!
//! ## Dependency rule
//!
//! Depends on `ovenctl-app` (port traits) and `ovenctl-domain` only.

mod codec;
mod config;
mod error;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use ovenctl_app::ports::{CommandChannel, CommandEnvelope, DeviceEvent, Inbound, TransportError};
use ovenctl_domain::device::Device;
use ovenctl_domain::id::{DeviceId, RequestId};

pub use config::WebSocketConfig;
pub use error::WebSocketError;

use codec::Decoded;

const INBOUND_CAPACITY: usize = 1024;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live connection: the write half plus the token stopping its reader.
struct Connection {
    writer: SplitSink<Socket, Message>,
    reader: CancellationToken,
}

struct Shared {
    inbound: broadcast::Sender<Inbound>,
    /// Last device list pushed by the server.
    devices: Mutex<Vec<Device>>,
    /// Device each in-flight request was addressed to.
    requests: Mutex<HashMap<RequestId, DeviceId>>,
}

impl Shared {
    fn publish(&self, message: Inbound) {
        // no subscribers is fine
        let _ = self.inbound.send(message);
    }

    fn route(&self, decoded: Decoded) {
        match decoded {
            Decoded::Devices(devices) => {
                tracing::debug!(count = devices.len(), "device list received");
                *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = devices.clone();
                self.publish(Inbound::Discovered(devices));
            }
            Decoded::Device { device_id, event } => {
                self.publish(Inbound::Device { device_id, event });
            }
            Decoded::Response {
                request_id,
                rejection,
            } => {
                let device_id = self
                    .requests
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&request_id);
                match device_id {
                    Some(device_id) => self.publish(Inbound::Device {
                        device_id,
                        event: DeviceEvent::Ack {
                            request_id,
                            rejection,
                        },
                    }),
                    None => tracing::debug!(%request_id, "response to unknown request"),
                }
            }
            Decoded::Ignored(command) => tracing::trace!(%command, "ignoring frame"),
        }
    }
}

/// Cloud WebSocket command channel.
pub struct WebSocketChannel {
    config: WebSocketConfig,
    shared: Arc<Shared>,
    connection: tokio::sync::Mutex<Option<Connection>>,
}

impl WebSocketChannel {
    /// Create a disconnected channel; nothing happens until
    /// [`connect`](CommandChannel::connect).
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        Self {
            config,
            shared: Arc::new(Shared {
                inbound,
                devices: Mutex::new(Vec::new()),
                requests: Mutex::new(HashMap::new()),
            }),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    #[tracing::instrument(skip(self), fields(url = %self.config.ws_url))]
    async fn open(&self) -> Result<Connection, WebSocketError> {
        let endpoint = self.config.endpoint()?;
        let timeout = self.config.connect_timeout();
        let (socket, _response) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(endpoint.as_str()))
                .await
                .map_err(|_| WebSocketError::ConnectTimeout(timeout))?
                .map_err(WebSocketError::Connect)?;
        tracing::info!("WebSocket connected");

        let (writer, reader) = socket.split();
        let token = CancellationToken::new();
        tokio::spawn(read_loop(reader, Arc::clone(&self.shared), token.clone()));
        Ok(Connection {
            writer,
            reader: token,
        })
    }

    async fn write(&self, envelope: &CommandEnvelope) -> Result<(), WebSocketError> {
        let frame = codec::encode(envelope)?;
        let mut guard = self.connection.lock().await;
        let Some(connection) = guard.as_mut() else {
            return Err(WebSocketError::NotConnected);
        };
        if connection.reader.is_cancelled() {
            *guard = None;
            return Err(WebSocketError::NotConnected);
        }
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(envelope.request_id, envelope.device_id.clone());
        if let Err(error) = connection.writer.send(Message::text(frame)).await {
            self.shared
                .requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&envelope.request_id);
            connection.reader.cancel();
            *guard = None;
            return Err(WebSocketError::Send(error));
        }
        Ok(())
    }
}

/// Read frames until the socket closes or `token` is cancelled.
async fn read_loop(mut reader: SplitStream<Socket>, shared: Arc<Shared>, token: CancellationToken) {
    let reason = loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match codec::decode(&text) {
                    Ok(decoded) => shared.route(decoded),
                    Err(error) => tracing::debug!(%error, "failed to parse frame"),
                },
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite answers pings on the next write or read
                    tracing::trace!("WebSocket ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map_or_else(
                        || "close frame".to_string(),
                        |frame| format!("close frame {}: {}", frame.code, frame.reason),
                    );
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => break error.to_string(),
                None => break "stream ended".to_string(),
            },
        }
    };
    tracing::warn!(%reason, "WebSocket closed");
    token.cancel();
    shared
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    shared.publish(Inbound::Closed { reason });
}

impl CommandChannel for WebSocketChannel {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut guard = self.connection.lock().await;
        if guard
            .as_ref()
            .is_some_and(|connection| !connection.reader.is_cancelled())
        {
            return Ok(());
        }
        *guard = Some(self.open().await?);
        Ok(())
    }

    async fn request_discovery(&self, accessories: &[String]) -> Result<(), TransportError> {
        if self.connection.lock().await.is_none() {
            return Err(WebSocketError::NotConnected.into());
        }
        let cached: Vec<Device> = self
            .shared
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|device| device.matches_accessories(accessories))
            .cloned()
            .collect();
        // a fresh list also arrives after every handshake
        if !cached.is_empty() {
            self.shared.publish(Inbound::Discovered(cached));
        }
        Ok(())
    }

    async fn send(&self, envelope: CommandEnvelope) -> Result<(), TransportError> {
        tracing::debug!(
            device_id = %envelope.device_id,
            request_id = %envelope.request_id,
            command = envelope.command.name(),
            "sending command"
        );
        self.write(&envelope).await.map_err(WebSocketError::into_transport)
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.shared.inbound.subscribe()
    }

    async fn close(&self) {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return;
        };
        connection.reader.cancel();
        if let Err(error) = connection.writer.close().await {
            tracing::debug!(%error, "error while closing WebSocket");
        }
        tracing::info!("WebSocket closed by client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovenctl_app::ports::OvenCommand;

    fn channel() -> WebSocketChannel {
        WebSocketChannel::new(WebSocketConfig {
            token: Some("token".to_string()),
            ..WebSocketConfig::default()
        })
    }

    #[tokio::test]
    async fn should_refuse_send_before_connect() {
        let result = channel()
            .send(CommandEnvelope {
                request_id: RequestId::new(),
                device_id: DeviceId::new("abc"),
                command: OvenCommand::Stop { cook_id: None },
            })
            .await;
        assert_eq!(result, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn should_refuse_discovery_before_connect() {
        let result = channel().request_discovery(&[]).await;
        assert_eq!(result, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn should_report_missing_token_on_connect() {
        let channel = WebSocketChannel::new(WebSocketConfig::default());
        let result = channel.connect().await;
        assert!(matches!(result, Err(TransportError::Connect(ref message)) if message.contains("token")));
    }

    #[tokio::test]
    async fn should_route_responses_to_requesting_device() {
        let channel = channel();
        let mut inbound = channel.subscribe();
        let request_id = RequestId::new();
        channel
            .shared
            .requests
            .lock()
            .unwrap()
            .insert(request_id, DeviceId::new("abc"));

        channel.shared.route(Decoded::Response {
            request_id,
            rejection: None,
        });

        assert_eq!(
            inbound.try_recv().unwrap(),
            Inbound::Device {
                device_id: DeviceId::new("abc"),
                event: DeviceEvent::Ack {
                    request_id,
                    rejection: None
                },
            }
        );
        assert!(channel.shared.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_drop_responses_for_unknown_requests() {
        let channel = channel();
        let mut inbound = channel.subscribe();

        channel.shared.route(Decoded::Response {
            request_id: RequestId::new(),
            rejection: None,
        });

        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_cache_device_list() {
        let channel = channel();
        let mut inbound = channel.subscribe();
        let device = Device::builder().id("abc").build().unwrap();

        channel.shared.route(Decoded::Devices(vec![device.clone()]));

        assert_eq!(inbound.try_recv().unwrap(), Inbound::Discovered(vec![device.clone()]));
        assert_eq!(*channel.shared.devices.lock().unwrap(), vec![device]);
    }
}
