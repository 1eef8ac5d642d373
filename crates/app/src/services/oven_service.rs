//! Oven service: discovery and cook control across every device on the
//! account.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use ovenctl_domain::device::Device;
use ovenctl_domain::error::{DeviceNotFoundError, OvenError};
use ovenctl_domain::event::{Event, EventType};
use ovenctl_domain::id::{CookId, DeviceId};
use ovenctl_domain::stage::CookProgram;
use ovenctl_domain::temperature::{ProbeTarget, Temperature};

use crate::ports::{CommandChannel, EventPublisher, Inbound};
use crate::registry::DeviceRegistry;
use crate::retry;
use crate::session::{DeviceSession, SessionConfig, SessionSnapshot, SessionState};

/// When discovery stops collecting answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryWait {
    /// Return with the first non-empty answer.
    FirstResponse,
    /// Collect answers until the timeout elapses.
    #[default]
    FullTimeout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub wait: DiscoveryWait,
    /// Accessory tags to keep; empty keeps everything.
    pub accessories: Vec<String>,
}

/// Application service owning the device registry and one session per device.
pub struct OvenService<C, P> {
    channel: Arc<C>,
    publisher: P,
    registry: Arc<DeviceRegistry>,
    sessions: Mutex<HashMap<DeviceId, Arc<DeviceSession<C, P>>>>,
    config: SessionConfig,
}

impl<C, P> OvenService<C, P>
where
    C: CommandChannel,
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    /// Create a new service over a shared command channel.
    pub fn new(channel: Arc<C>, publisher: P, config: SessionConfig) -> Self {
        Self {
            channel,
            publisher,
            registry: Arc::new(DeviceRegistry::new()),
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Open the shared channel, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`OvenError::Connection`] once the retry policy gives up.
    #[tracing::instrument(skip(self))]
    pub async fn connect(&self) -> Result<(), OvenError> {
        retry::with_backoff(&self.config.retry, "connect", |_| self.channel.connect())
            .await
            .map_err(|exhausted| exhausted.into_oven_error(None))
    }

    /// Ask every device on the account to announce itself.
    ///
    /// Answers are merged into the registry. The whole call, connecting and
    /// sending the request included, finishes within `timeout`. Finding
    /// nothing, an unreachable transport and an expired timeout all yield an
    /// empty list.
    ///
    /// # Errors
    ///
    /// None at present; the `Result` leaves room for failures that are not
    /// about reachability.
    #[tracing::instrument(skip(self, options), fields(timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)))]
    pub async fn discover_devices(
        &self,
        timeout: Duration,
        options: &DiscoveryOptions,
    ) -> Result<Vec<Device>, OvenError> {
        let deadline = Instant::now() + timeout;
        let mut inbound = self.channel.subscribe();
        let requested = tokio::time::timeout_at(deadline, async {
            self.connect().await?;
            retry::with_backoff(&self.config.retry, "discover", |_| {
                self.channel.request_discovery(&options.accessories)
            })
            .await
            .map_err(|exhausted| exhausted.into_oven_error(None))
        })
        .await;
        match requested {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(%error, "discovery request failed, no devices found");
                return Ok(Vec::new());
            }
            Err(_) => {
                tracing::warn!("discovery timed out before the request was sent");
                return Ok(Vec::new());
            }
        }

        let mut found: Vec<Device> = Vec::new();
        loop {
            let received = match tokio::time::timeout_at(deadline, inbound.recv()).await {
                Ok(received) => received,
                Err(_) => break,
            };
            match received {
                Ok(Inbound::Discovered(devices)) => {
                    let devices: Vec<Device> = devices
                        .into_iter()
                        .filter(|device| device.matches_accessories(&options.accessories))
                        .collect();
                    let answered = !devices.is_empty();
                    for device in devices {
                        match found.iter_mut().find(|known| known.id == device.id) {
                            Some(known) => *known = device,
                            None => found.push(device),
                        }
                    }
                    if answered && options.wait == DiscoveryWait::FirstResponse {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "discovery receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::info!(count = found.len(), "discovery finished");
        self.registry.upsert_all(found.iter().cloned());
        let ids: Vec<&str> = found.iter().map(|device| device.id.as_str()).collect();
        let event = Event::new(
            EventType::DevicesDiscovered,
            None,
            serde_json::json!({ "device_ids": ids }),
        );
        if let Err(error) = self.publisher.publish(event).await {
            tracing::warn!(%error, "failed to publish discovery event");
        }
        Ok(found)
    }

    /// Every device seen so far, in id order.
    #[must_use]
    pub fn list_devices(&self) -> Vec<Device> {
        self.registry.list()
    }

    /// # Errors
    ///
    /// Returns [`OvenError::DeviceNotFound`] when `id` was never discovered.
    pub fn get_device(&self, id: &DeviceId) -> Result<Device, OvenError> {
        self.registry.get(id).ok_or_else(|| not_found(id))
    }

    /// Start `program` on `device_id`, returning once stage 0 is acknowledged.
    ///
    /// # Errors
    ///
    /// - [`OvenError::DeviceNotFound`] for an undiscovered device
    /// - anything [`DeviceSession::start_cook`] returns
    #[tracing::instrument(skip(self, program))]
    pub async fn start_cook(
        &self,
        device_id: &DeviceId,
        program: CookProgram,
    ) -> Result<CookId, OvenError> {
        self.session(device_id)?.start_cook(program).await
    }

    /// Single-stage cook at `temperature`, optionally timed.
    ///
    /// # Errors
    ///
    /// As [`start_cook`](Self::start_cook), plus [`OvenError::Validation`]
    /// for a zero duration.
    #[tracing::instrument(skip(self), fields(temperature = %temperature))]
    pub async fn start_simple_cook(
        &self,
        device_id: &DeviceId,
        temperature: Temperature,
        duration_secs: Option<u32>,
    ) -> Result<CookId, OvenError> {
        let program = CookProgram::simple(temperature, duration_secs)?;
        self.start_cook(device_id, program).await
    }

    /// Stop the cook on `device_id`, including one started by another client.
    ///
    /// # Errors
    ///
    /// - [`OvenError::DeviceNotFound`] for an undiscovered device
    /// - anything [`DeviceSession::stop_cook`] returns
    #[tracing::instrument(skip(self))]
    pub async fn stop_cook(&self, device_id: &DeviceId) -> Result<(), OvenError> {
        let session = self.session(device_id)?;
        if session.state() == SessionState::Disconnected {
            session.connect().await?;
        }
        session.stop_cook().await
    }

    /// # Errors
    ///
    /// - [`OvenError::DeviceNotFound`] for an undiscovered device
    /// - [`OvenError::InvalidState`] when the session is not connected
    #[tracing::instrument(skip(self))]
    pub async fn set_probe(&self, device_id: &DeviceId, target: ProbeTarget) -> Result<(), OvenError> {
        let session = self.session(device_id)?;
        if session.state() == SessionState::Disconnected {
            session.connect().await?;
        }
        session.set_probe(target).await
    }

    /// Session state for `device_id`; `Disconnected` until first used.
    ///
    /// # Errors
    ///
    /// Returns [`OvenError::DeviceNotFound`] for an undiscovered device.
    pub fn session_state(&self, device_id: &DeviceId) -> Result<SessionState, OvenError> {
        self.session_snapshot(device_id).map(|snapshot| snapshot.state)
    }

    /// # Errors
    ///
    /// Returns [`OvenError::DeviceNotFound`] for an undiscovered device.
    pub fn session_snapshot(&self, device_id: &DeviceId) -> Result<SessionSnapshot, OvenError> {
        Ok(self.session(device_id)?.snapshot())
    }

    /// Close every session, then the channel.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();
        for session in &sessions {
            session.close();
        }
        self.channel.close().await;
        tracing::info!(sessions = sessions.len(), "oven service shut down");
    }

    fn session(&self, device_id: &DeviceId) -> Result<Arc<DeviceSession<C, P>>, OvenError> {
        if !self.registry.contains(device_id) {
            return Err(not_found(device_id));
        }
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.entry(device_id.clone()).or_insert_with(|| {
            Arc::new(DeviceSession::open(
                device_id.clone(),
                Arc::clone(&self.channel),
                self.publisher.clone(),
                Arc::clone(&self.registry),
                self.config,
            ))
        });
        Ok(Arc::clone(session))
    }
}

fn not_found(id: &DeviceId) -> OvenError {
    DeviceNotFoundError {
        device_id: id.clone(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::sync::broadcast;

    use ovenctl_domain::device::OvenVersion;

    use crate::notification_bus::NotificationBus;
    use crate::ports::{CommandEnvelope, DeviceEvent, TransportError};
    use crate::session::CookPhase;

    /// Answers discovery with a fixed device list and acknowledges commands.
    struct FakeChannel {
        inbound: broadcast::Sender<Inbound>,
        devices: Vec<Device>,
        answers: u32,
        failing_connects: AtomicU32,
        discoveries: AtomicU32,
    }

    impl FakeChannel {
        fn new(devices: Vec<Device>, answers: u32) -> Arc<Self> {
            let (inbound, _) = broadcast::channel(32);
            Arc::new(Self {
                inbound,
                devices,
                answers,
                failing_connects: AtomicU32::new(0),
                discoveries: AtomicU32::new(0),
            })
        }
    }

    impl CommandChannel for FakeChannel {
        async fn connect(&self) -> Result<(), TransportError> {
            let failing = self.failing_connects.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_connects.store(failing - 1, Ordering::SeqCst);
                return Err(TransportError::Connect("refused".to_string()));
            }
            Ok(())
        }

        async fn request_discovery(&self, _accessories: &[String]) -> Result<(), TransportError> {
            self.discoveries.fetch_add(1, Ordering::SeqCst);
            let inbound = self.inbound.clone();
            let devices = self.devices.clone();
            let answers = self.answers;
            tokio::spawn(async move {
                for answer in 0..answers {
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(answer + 1))).await;
                    let _ = inbound.send(Inbound::Discovered(devices.clone()));
                }
            });
            Ok(())
        }

        async fn send(&self, envelope: CommandEnvelope) -> Result<(), TransportError> {
            let _ = self.inbound.send(Inbound::Device {
                device_id: envelope.device_id,
                event: DeviceEvent::Ack {
                    request_id: envelope.request_id,
                    rejection: None,
                },
            });
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<Inbound> {
            self.inbound.subscribe()
        }

        async fn close(&self) {}
    }

    fn oven(id: &str, device_type: &str) -> Device {
        Device::builder()
            .id(id)
            .device_type(device_type)
            .oven_version(OvenVersion::V2)
            .build()
            .unwrap()
    }

    fn service(channel: &Arc<FakeChannel>) -> OvenService<FakeChannel, NotificationBus> {
        OvenService::new(Arc::clone(channel), NotificationBus::new(32), SessionConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn should_collect_devices_until_timeout() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO"), oven("oven-2", "APO")], 2);
        let service = service(&channel);

        let found = service
            .discover_devices(Duration::from_secs(1), &DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(service.list_devices().len(), 2);
        assert!(service.get_device(&DeviceId::new("oven-2")).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_empty_list_when_nobody_answers() {
        let channel = FakeChannel::new(Vec::new(), 0);
        let service = service(&channel);

        let started = Instant::now();
        let found = service
            .discover_devices(Duration::from_secs(2), &DiscoveryOptions::default())
            .await
            .unwrap();

        assert!(found.is_empty());
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_at_first_answer_when_requested() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO")], 3);
        let service = service(&channel);
        let options = DiscoveryOptions {
            wait: DiscoveryWait::FirstResponse,
            accessories: Vec::new(),
        };

        let started = Instant::now();
        let found = service
            .discover_devices(Duration::from_secs(5), &options)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn should_filter_discovered_devices_by_accessory() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO"), oven("kettle-1", "KTL")], 1);
        let service = service(&channel);
        let options = DiscoveryOptions {
            wait: DiscoveryWait::FullTimeout,
            accessories: vec!["apo".to_string()],
        };

        let found = service
            .discover_devices(Duration::from_secs(1), &options)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "oven-1");
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_connect_before_discovering() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO")], 1);
        channel.failing_connects.store(2, Ordering::SeqCst);
        let service = service(&channel);

        let found = service
            .discover_devices(Duration::from_secs(5), &DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(channel.discoveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_empty_list_within_timeout_when_connect_keeps_failing() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO")], 1);
        channel.failing_connects.store(100, Ordering::SeqCst);
        let service = service(&channel);

        let started = Instant::now();
        let found = service
            .discover_devices(Duration::from_millis(100), &DiscoveryOptions::default())
            .await
            .unwrap();

        assert!(found.is_empty());
        assert!(started.elapsed() <= Duration::from_millis(100));
        assert_eq!(channel.discoveries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_empty_list_when_connect_retries_are_exhausted() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO")], 1);
        channel.failing_connects.store(100, Ordering::SeqCst);
        let service = service(&channel);

        let started = Instant::now();
        let found = service
            .discover_devices(Duration::from_secs(60), &DiscoveryOptions::default())
            .await
            .unwrap();

        assert!(found.is_empty());
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(service.list_devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_not_found_when_device_unknown() {
        let channel = FakeChannel::new(Vec::new(), 0);
        let service = service(&channel);
        let temperature = Temperature::from_celsius(200.0).unwrap();

        let result = service
            .start_simple_cook(&DeviceId::new("ghost"), temperature, Some(60))
            .await;

        assert!(matches!(result, Err(OvenError::DeviceNotFound(_))));
        assert!(matches!(
            service.session_state(&DeviceId::new("ghost")),
            Err(OvenError::DeviceNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_start_simple_cook_on_discovered_device() {
        let channel = FakeChannel::new(vec![oven("oven-1", "APO")], 1);
        let service = service(&channel);
        service
            .discover_devices(Duration::from_millis(500), &DiscoveryOptions::default())
            .await
            .unwrap();
        let id = DeviceId::new("oven-1");

        assert_eq!(service.session_state(&id).unwrap(), SessionState::Disconnected);
        let temperature = Temperature::from_celsius(200.0).unwrap();
        service.start_simple_cook(&id, temperature, Some(60)).await.unwrap();

        assert_eq!(
            service.session_state(&id).unwrap(),
            SessionState::Connected(CookPhase::Cooking)
        );
        service.stop_cook(&id).await.unwrap();
        assert_eq!(
            service.session_state(&id).unwrap(),
            SessionState::Connected(CookPhase::Idle)
        );
        service.shutdown().await;
    }
}
