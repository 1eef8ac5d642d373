//! Device session: the live control handle for one oven.
//!
//! A [`DeviceSession`] wraps a [`SessionMachine`] and drives it from two
//! sides: caller operations (`start_cook`, `stop_cook`, `set_probe`) and an
//! event pump that feeds inbound notifications from the shared
//! [`CommandChannel`]. Commands for one device are serialised by a per-session
//! lock, so at most one is in flight at a time; each waits for its
//! acknowledgement under `ack_timeout` and is retried per [`RetryPolicy`].

pub mod machine;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ovenctl_domain::device::DeviceState;
use ovenctl_domain::error::{CommandRejectedError, OvenError, ValidationError};
use ovenctl_domain::event::{Event, EventType};
use ovenctl_domain::id::{CookId, DeviceId, RequestId};
use ovenctl_domain::stage::CookProgram;
use ovenctl_domain::temperature::ProbeTarget;

pub use machine::{CookPhase, Effect, SessionMachine, SessionState, StageFailure};

use crate::ports::{
    CommandChannel, CommandEnvelope, DeviceEvent, EventPublisher, Inbound, OvenCommand,
    TransportError,
};
use crate::registry::DeviceRegistry;
use crate::retry::{self, RetryPolicy};

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for a device to acknowledge a command.
    pub ack_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Point-in-time view of a session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub cook_id: Option<CookId>,
    pub stage_index: Option<usize>,
    pub awaiting_preheat: bool,
    pub retry_count: u32,
    pub last_failure: Option<StageFailure>,
}

#[derive(Debug)]
enum Ack {
    Accepted,
    Rejected(String),
}

struct Shared<C, P> {
    device_id: DeviceId,
    channel: Arc<C>,
    publisher: P,
    registry: Arc<DeviceRegistry>,
    config: SessionConfig,
    machine: Mutex<SessionMachine>,
    commands: tokio::sync::Mutex<()>,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Ack>>>,
    shutdown: CancellationToken,
}

/// Live control handle for one device.
///
/// Dropping the session stops its event pump and any stage submission it
/// spawned.
pub struct DeviceSession<C, P> {
    shared: Arc<Shared<C, P>>,
    pump: JoinHandle<()>,
}

impl<C, P> DeviceSession<C, P>
where
    C: CommandChannel,
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    /// Create a disconnected session and start its event pump.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        device_id: DeviceId,
        channel: Arc<C>,
        publisher: P,
        registry: Arc<DeviceRegistry>,
        config: SessionConfig,
    ) -> Self {
        let inbound = channel.subscribe();
        let shared = Arc::new(Shared {
            machine: Mutex::new(SessionMachine::new(device_id.clone())),
            device_id,
            channel,
            publisher,
            registry,
            config,
            commands: tokio::sync::Mutex::new(()),
            pending: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        });
        let pump = tokio::spawn(Shared::pump(Arc::clone(&shared), inbound));
        Self { shared, pump }
    }

    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.shared.device_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.lock_machine().state()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let machine = self.shared.lock_machine();
        SessionSnapshot {
            state: machine.state(),
            cook_id: machine.cook_id(),
            stage_index: machine.current_stage(),
            awaiting_preheat: machine.is_awaiting_preheat(),
            retry_count: machine.retry_count(),
            last_failure: machine.last_failure().cloned(),
        }
    }

    /// Open the channel for this session, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`OvenError::Connection`] once the retry policy gives up; the
    /// session is then `Disconnected`.
    #[tracing::instrument(skip(self), fields(device_id = %self.shared.device_id))]
    pub async fn connect(&self) -> Result<(), OvenError> {
        let _command = self.shared.commands.lock().await;
        self.shared.connect().await
    }

    /// Submit stage 0 of `program` and wait for the acknowledgement.
    ///
    /// A disconnected session is reconnected first. Nothing changes if the
    /// returned future is dropped before the device acknowledges.
    ///
    /// # Errors
    ///
    /// - [`OvenError::InvalidState`] unless the session is `Connected(Idle)`
    /// - [`OvenError::CommandRejected`] when the device refuses the stage
    /// - [`OvenError::Connection`] when the transport keeps failing
    #[tracing::instrument(skip(self, program), fields(device_id = %self.shared.device_id, stages = program.len()))]
    pub async fn start_cook(&self, program: CookProgram) -> Result<CookId, OvenError> {
        let _command = self.shared.commands.lock().await;
        if self.state() == SessionState::Disconnected {
            self.shared.connect().await?;
        }
        self.shared.lock_machine().ensure_can_start()?;

        let Some(first) = program.get(0).cloned() else {
            return Err(ValidationError::EmptyProgram.into());
        };
        let cook_id = CookId::new();
        let title = first.title().to_string();
        self.shared
            .request(OvenCommand::StartStage {
                cook_id,
                stage_index: 0,
                stage_count: program.len(),
                stage: first,
            })
            .await?;

        self.shared
            .transition(|machine| machine.on_cook_started(cook_id, program))
            .await;
        self.shared
            .notify(
                EventType::StageStarted,
                serde_json::json!({ "cook_id": cook_id, "stage_index": 0, "title": title }),
            )
            .await;
        tracing::info!(%cook_id, "cook started");
        Ok(cook_id)
    }

    /// Stop the running cook.
    ///
    /// # Errors
    ///
    /// - [`OvenError::InvalidState`] when idle or not connected
    /// - [`OvenError::CommandRejected`] / [`OvenError::Connection`] as for
    ///   [`start_cook`](Self::start_cook)
    #[tracing::instrument(skip(self), fields(device_id = %self.shared.device_id))]
    pub async fn stop_cook(&self) -> Result<(), OvenError> {
        let _command = self.shared.commands.lock().await;
        let cook_id = {
            let machine = self.shared.lock_machine();
            machine.ensure_can_stop()?;
            machine.cook_id()
        };
        self.shared.request(OvenCommand::Stop { cook_id }).await?;
        self.shared.transition(SessionMachine::on_stopped).await;
        self.shared
            .notify(EventType::CookStopped, serde_json::json!({ "cook_id": cook_id }))
            .await;
        tracing::info!("cook stopped");
        Ok(())
    }

    /// Set the food probe target. Valid in any connected phase.
    ///
    /// # Errors
    ///
    /// [`OvenError::InvalidState`] when not connected, otherwise as for
    /// [`start_cook`](Self::start_cook).
    #[tracing::instrument(skip(self), fields(device_id = %self.shared.device_id, target = %target))]
    pub async fn set_probe(&self, target: ProbeTarget) -> Result<(), OvenError> {
        let _command = self.shared.commands.lock().await;
        self.shared.lock_machine().ensure_connected("set probe")?;
        self.shared.request(OvenCommand::SetProbe { target }).await
    }

    /// Stop the event pump and any spawned stage submissions.
    pub fn close(&self) {
        self.shared.shutdown.cancel();
        self.pump.abort();
    }
}

impl<C, P> Drop for DeviceSession<C, P> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        self.pump.abort();
    }
}

impl<C, P> Shared<C, P>
where
    C: CommandChannel,
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    fn lock_machine(&self) -> std::sync::MutexGuard<'_, SessionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the machine and publish a state change if there was one.
    async fn transition<R>(&self, f: impl FnOnce(&mut SessionMachine) -> R) -> R {
        let (result, before, after) = {
            let mut machine = self.lock_machine();
            let before = machine.state();
            let result = f(&mut machine);
            (result, before, machine.state())
        };
        if before != after {
            tracing::debug!(from = %before, to = %after, "session state changed");
            self.notify(
                EventType::SessionStateChanged,
                serde_json::json!({ "from": before.to_string(), "to": after.to_string() }),
            )
            .await;
        }
        result
    }

    async fn notify(&self, event_type: EventType, data: serde_json::Value) {
        let event = Event::for_device(event_type, self.device_id.clone(), data);
        if let Err(error) = self.publisher.publish(event).await {
            tracing::warn!(%error, "failed to publish session event");
        }
    }

    /// Publish from a context that cannot await. Dropped outside a runtime.
    fn notify_detached(&self, event_type: EventType, data: serde_json::Value) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let event = Event::for_device(event_type, self.device_id.clone(), data);
        let publisher = self.publisher.clone();
        runtime.spawn(async move {
            if let Err(error) = publisher.publish(event).await {
                tracing::warn!(%error, "failed to publish session event");
            }
        });
    }

    /// Caller must hold the command lock.
    async fn connect(&self) -> Result<(), OvenError> {
        if matches!(
            self.lock_machine().state(),
            SessionState::Connected(_) | SessionState::Degraded(_)
        ) {
            return Ok(());
        }
        self.transition(SessionMachine::on_connecting).await;
        let _scope = RetryScope { shared: self };
        let outcome = retry::with_backoff(&self.config.retry, "connect", |attempt| async move {
            if attempt > 0 {
                self.transition(SessionMachine::on_transport_degraded).await;
            }
            self.channel.connect().await
        })
        .await;
        match outcome {
            Ok(()) => {
                let remote = self.registry.get(&self.device_id).map(|device| device.state);
                self.transition(|machine| {
                    machine.on_connected();
                    if let Some(state) = remote {
                        machine.on_remote_state(state);
                    }
                })
                .await;
                Ok(())
            }
            Err(exhausted) => {
                self.transition(SessionMachine::on_disconnected).await;
                Err(exhausted.into_oven_error(Some(self.device_id.clone())))
            }
        }
    }

    /// Send `command` and wait for its acknowledgement, retrying transient
    /// failures. Caller must hold the command lock.
    async fn request(&self, command: OvenCommand) -> Result<(), OvenError> {
        let envelope = CommandEnvelope {
            request_id: RequestId::new(),
            device_id: self.device_id.clone(),
            command,
        };
        let name = envelope.command.name();
        let _scope = RetryScope { shared: self };
        let outcome = retry::with_backoff(&self.config.retry, name, |attempt| {
            self.attempt(&envelope, attempt)
        })
        .await;

        match outcome {
            Ok(ack) => {
                self.transition(SessionMachine::on_transport_recovered).await;
                match ack {
                    Ack::Accepted => Ok(()),
                    Ack::Rejected(reason) => Err(CommandRejectedError {
                        device_id: self.device_id.clone(),
                        command: name,
                        reason,
                    }
                    .into()),
                }
            }
            Err(exhausted) => {
                self.transition(SessionMachine::on_disconnected).await;
                Err(exhausted.into_oven_error(Some(self.device_id.clone())))
            }
        }
    }

    async fn attempt(&self, envelope: &CommandEnvelope, attempt: u32) -> Result<Ack, TransportError> {
        if attempt > 0 {
            self.transition(SessionMachine::on_transport_degraded).await;
            self.channel.connect().await?;
        }
        let (sender, receiver) = oneshot::channel();
        let _pending = PendingAck::register(&self.pending, envelope.request_id, sender);
        self.channel.send(envelope.clone()).await?;
        match tokio::time::timeout(self.config.ack_timeout, receiver).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::AckTimeout(self.config.ack_timeout)),
        }
    }

    fn resolve(&self, request_id: RequestId, ack: Ack) {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(ack);
            }
            None => tracing::debug!(%request_id, "acknowledgement for unknown request"),
        }
    }

    fn fail_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn pump(self: Arc<Self>, mut inbound: broadcast::Receiver<Inbound>) {
        loop {
            let received = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                received = inbound.recv() => received,
            };
            match received {
                Ok(Inbound::Device { device_id, event }) if device_id == self.device_id => {
                    self.on_device_event(event).await;
                }
                Ok(Inbound::Closed { reason }) => {
                    tracing::warn!(%reason, "command channel closed");
                    self.fail_pending();
                    self.transition(SessionMachine::on_disconnected).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session event pump lagged");
                }
                Err(RecvError::Closed) => {
                    self.fail_pending();
                    self.transition(SessionMachine::on_disconnected).await;
                    break;
                }
            }
        }
    }

    async fn on_device_event(self: &Arc<Self>, event: DeviceEvent) {
        let effect = match event {
            DeviceEvent::Ack {
                request_id,
                rejection,
            } => {
                let ack = rejection.map_or(Ack::Accepted, Ack::Rejected);
                self.resolve(request_id, ack);
                None
            }
            DeviceEvent::StateUpdate(report) => {
                self.registry.apply_report(&self.device_id, &report);
                self.transition(|machine| {
                    machine.on_remote_state(report.state);
                    machine.on_state_update(&report)
                })
                .await
            }
            DeviceEvent::StageComplete { stage_index } => {
                self.transition(|machine| machine.on_stage_complete(stage_index))
                    .await
            }
            DeviceEvent::Fault { message } => {
                self.registry.set_state(&self.device_id, DeviceState::Error);
                self.transition(|machine| machine.on_fault(message)).await
            }
            DeviceEvent::Disconnected => {
                self.fail_pending();
                self.transition(SessionMachine::on_disconnected).await;
                None
            }
        };
        if let Some(effect) = effect {
            self.apply(effect).await;
        }
    }

    async fn apply(self: &Arc<Self>, effect: Effect) {
        match effect {
            Effect::SubmitStage {
                cook_id,
                stage_index,
            } => self.spawn_command(move |shared| async move {
                shared.advance(cook_id, stage_index).await;
            }),
            Effect::StartTimer {
                cook_id,
                stage_index,
            } => self.spawn_command(move |shared| async move {
                shared.start_timer(cook_id, stage_index).await;
            }),
            Effect::CookCompleted { cook_id } => {
                tracing::info!(%cook_id, "cook completed");
                self.notify(EventType::CookCompleted, serde_json::json!({ "cook_id": cook_id }))
                    .await;
            }
            Effect::Fault { message } => {
                tracing::warn!(%message, "device fault");
                self.notify(EventType::DeviceFault, serde_json::json!({ "message": message }))
                    .await;
            }
        }
    }

    /// Commands triggered by notifications run off the pump, which must keep
    /// delivering acknowledgements.
    fn spawn_command<F, Fut>(self: &Arc<Self>, work: F)
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let work = work(Arc::clone(self));
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = work => {}
            }
        });
    }

    #[tracing::instrument(skip(self), fields(device_id = %self.device_id))]
    async fn advance(self: &Arc<Self>, cook_id: CookId, stage_index: usize) {
        let _command = self.commands.lock().await;
        let next = self.lock_machine().stage_to_submit(stage_index);
        let Some((current, stage, stage_count)) = next else {
            tracing::debug!("stage advance overtaken");
            return;
        };
        if current != cook_id {
            return;
        }
        let title = stage.title().to_string();
        let result = self
            .request(OvenCommand::StartStage {
                cook_id,
                stage_index,
                stage_count,
                stage,
            })
            .await;
        match result {
            Ok(()) => {
                let started = self
                    .transition(|machine| {
                        machine
                            .on_stage_started(stage_index)
                            .then(|| machine.take_early_preheat())
                    })
                    .await;
                if let Some(early) = started {
                    self.notify(
                        EventType::StageStarted,
                        serde_json::json!({
                            "cook_id": cook_id,
                            "stage_index": stage_index,
                            "title": title,
                        }),
                    )
                    .await;
                    if let Some(Effect::StartTimer {
                        cook_id,
                        stage_index,
                    }) = early
                    {
                        self.spawn_command(move |shared| async move {
                            shared.start_timer(cook_id, stage_index).await;
                        });
                    }
                }
            }
            Err(error) => self.fail_stage(stage_index, &error).await,
        }
    }

    #[tracing::instrument(skip(self), fields(device_id = %self.device_id))]
    async fn start_timer(&self, cook_id: CookId, stage_index: usize) {
        let _command = self.commands.lock().await;
        let timer = {
            let machine = self.lock_machine();
            if machine.cook_id() != Some(cook_id) || machine.current_stage() != Some(stage_index) {
                return;
            }
            machine
                .program()
                .and_then(|program| program.get(stage_index))
                .and_then(ovenctl_domain::stage::CookStage::timer)
        };
        let Some(timer) = timer else {
            return;
        };
        let command = OvenCommand::StartTimer {
            cook_id,
            stage_index,
            timer,
        };
        match self.request(command).await {
            Ok(()) => {
                self.notify(
                    EventType::TimerStarted,
                    serde_json::json!({
                        "cook_id": cook_id,
                        "stage_index": stage_index,
                        "seconds": timer.initial(),
                    }),
                )
                .await;
            }
            Err(error) => self.fail_stage(stage_index, &error).await,
        }
    }

    async fn fail_stage(&self, stage_index: usize, error: &OvenError) {
        let reason = error.to_string();
        let failure = self
            .transition(|machine| machine.on_stage_failed(stage_index, reason.clone()))
            .await;
        tracing::warn!(error = %failure, "stage failed");
        self.notify(
            EventType::StageFailed,
            serde_json::json!({ "stage_index": stage_index, "reason": reason }),
        )
        .await;
    }
}

/// Lives for one connect or retried request. If that future is dropped
/// before its outcome is committed, the session leaves `Connecting` or
/// `Degraded` instead of keeping a state no retry is driving any more.
struct RetryScope<'a, C, P>
where
    C: CommandChannel,
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    shared: &'a Shared<C, P>,
}

impl<C, P> Drop for RetryScope<'_, C, P>
where
    C: CommandChannel,
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let (before, after) = {
            let mut machine = self.shared.lock_machine();
            let before = machine.state();
            machine.on_retry_abandoned();
            (before, machine.state())
        };
        if before != after {
            tracing::debug!(from = %before, to = %after, "retry abandoned");
            self.shared.notify_detached(
                EventType::SessionStateChanged,
                serde_json::json!({ "from": before.to_string(), "to": after.to_string() }),
            );
        }
    }
}

/// Removes its entry from the pending map when dropped, so a cancelled or
/// timed-out request leaves nothing behind.
struct PendingAck<'a> {
    pending: &'a Mutex<HashMap<RequestId, oneshot::Sender<Ack>>>,
    request_id: RequestId,
}

impl<'a> PendingAck<'a> {
    fn register(
        pending: &'a Mutex<HashMap<RequestId, oneshot::Sender<Ack>>>,
        request_id: RequestId,
        sender: oneshot::Sender<Ack>,
    ) -> Self {
        pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, sender);
        Self {
            pending,
            request_id,
        }
    }
}

impl Drop for PendingAck<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}
