//! Transport port: the command channel to the appliances.
//!
//! A channel carries outbound [`CommandEnvelope`]s and fans inbound
//! notifications out to every subscriber as [`Inbound`] messages. One channel
//! serves every device on the account; sessions filter by device id.
//!
//! Implementations decide how commands are framed on the wire. They never
//! retry on their own: transient failures are reported as [`TransportError`]
//! and retried by the caller under its [`RetryPolicy`](crate::retry::RetryPolicy).

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

use ovenctl_domain::device::{Device, DeviceState};
use ovenctl_domain::id::{CookId, DeviceId, RequestId};
use ovenctl_domain::stage::CookStage;
use ovenctl_domain::temperature::ProbeTarget;
use ovenctl_domain::timer::Timer;

/// A failure reported by a [`CommandChannel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("channel is not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("no acknowledgement within {0:?}")]
    AckTimeout(Duration),

    #[error("channel closed")]
    Closed,

    /// The command cannot be framed for this transport; resending will not help.
    #[error("cannot encode command: {0}")]
    Encode(String),
}

impl TransportError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

/// An instruction for one device.
#[derive(Debug, Clone, PartialEq)]
pub enum OvenCommand {
    /// Program the cavity for one stage of a cook.
    StartStage {
        cook_id: CookId,
        stage_index: usize,
        stage_count: usize,
        stage: CookStage,
    },
    /// Start the current stage's timer after a preheat wait.
    StartTimer {
        cook_id: CookId,
        stage_index: usize,
        timer: Timer,
    },
    Stop {
        cook_id: Option<CookId>,
    },
    SetProbe {
        target: ProbeTarget,
    },
}

impl OvenCommand {
    /// Short name used in logs and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartStage { .. } => "start stage",
            Self::StartTimer { .. } => "start timer",
            Self::Stop { .. } => "stop",
            Self::SetProbe { .. } => "set probe",
        }
    }
}

/// A command addressed to a device, tagged for acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub request_id: RequestId,
    pub device_id: DeviceId,
    pub command: OvenCommand,
}

/// Periodic status pushed by a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceReport {
    pub state: DeviceState,
    pub current_celsius: Option<f64>,
    /// The cavity has reached the current stage setpoint.
    pub target_reached: bool,
}

/// A decoded notification from one device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Response to a [`CommandEnvelope`]; `rejection` carries the device's reason.
    Ack {
        request_id: RequestId,
        rejection: Option<String>,
    },
    StateUpdate(DeviceReport),
    StageComplete {
        stage_index: usize,
    },
    Fault {
        message: String,
    },
    /// The device dropped off the account's channel.
    Disconnected,
}

/// Everything a channel fans out to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to a discovery request.
    Discovered(Vec<Device>),
    Device {
        device_id: DeviceId,
        event: DeviceEvent,
    },
    /// The channel itself went down; every pending acknowledgement is lost.
    Closed {
        reason: String,
    },
}

/// Outbound command channel shared by every device session.
pub trait CommandChannel: Send + Sync + 'static {
    /// Open the channel. Calling it while already connected is a no-op.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Ask for the device list, restricted to `accessories` when non-empty.
    ///
    /// Answers arrive as [`Inbound::Discovered`].
    fn request_discovery(
        &self,
        accessories: &[String],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send one command. Returns once the command is on the wire, not when it
    /// is acknowledged.
    fn send(
        &self,
        envelope: CommandEnvelope,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receive every inbound message published after this call.
    fn subscribe(&self) -> broadcast::Receiver<Inbound>;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl<T: CommandChannel> CommandChannel for std::sync::Arc<T> {
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).connect()
    }

    fn request_discovery(
        &self,
        accessories: &[String],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).request_discovery(accessories)
    }

    fn send(
        &self,
        envelope: CommandEnvelope,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send(envelope)
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        (**self).subscribe()
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        (**self).close()
    }
}
