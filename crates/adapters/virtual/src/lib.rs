//! # ovenctl-adapter-virtual
//!
//! Virtual command channel backed by simulated ovens, for tests and
//! demonstration.
//!
//! ## Behaviour
//!
//! | Command | Simulated oven |
//! |---------|----------------|
//! | start stage | heats towards the setpoint (`Preheating`), counts down an immediate timer |
//! | start timer | counts down a timer held for preheat |
//! | stop | returns to `Idle` |
//! | set probe | records the probe target |
//!
//! Every accepted command is acknowledged at once. With a [`Simulation`]
//! attached, the oven also reports reaching its setpoint and completing each
//! timed stage after scaled delays; without one, tests drive notifications
//! through [`VirtualOvenChannel::emit`].
//!
//! Faults can be injected: failing connects, failing sends, rejected
//! commands and silently dropped acknowledgements.
//!
//! ## Dependency rule
//!
//! Depends on `ovenctl-app` (port traits) and `ovenctl-domain` only.

mod error;
mod oven;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use ovenctl_app::ports::{
    CommandChannel, CommandEnvelope, DeviceEvent, Inbound, TransportError,
};
use ovenctl_domain::device::{Device, DeviceState, OvenVersion};
use ovenctl_domain::id::{CookId, DeviceId};

pub use error::VirtualError;

use oven::{Reaction, VirtualOven};

/// Id of the oven a default channel simulates.
pub const DEFAULT_OVEN_ID: &str = "virtual-oven-1";

const INBOUND_CAPACITY: usize = 256;

/// Timing of the automatic simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Simulation {
    /// Time to reach any setpoint, before scaling.
    pub preheat: Duration,
    /// Factor applied to every simulated delay, e.g. `0.01` for demos.
    pub time_scale: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            preheat: Duration::from_secs(5),
            time_scale: 1.0,
        }
    }
}

impl Simulation {
    fn scaled(&self, duration: Duration) -> Duration {
        duration.mul_f64(self.time_scale.max(0.0))
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_connects: AtomicU32,
    failing_sends: AtomicU32,
    rejection: Mutex<Option<String>>,
    silent: AtomicBool,
}

/// Take one scheduled failure from `counter`, if any is left.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

/// In-process [`CommandChannel`] over simulated ovens.
pub struct VirtualOvenChannel {
    ovens: Arc<Mutex<BTreeMap<DeviceId, VirtualOven>>>,
    inbound: broadcast::Sender<Inbound>,
    connected: AtomicBool,
    faults: Faults,
    simulation: Option<Simulation>,
    activity: Mutex<CancellationToken>,
    sent: Mutex<Vec<CommandEnvelope>>,
}

impl Default for VirtualOvenChannel {
    fn default() -> Self {
        let device = Device::builder()
            .id(DEFAULT_OVEN_ID)
            .name("Virtual Oven")
            .oven_version(OvenVersion::V2)
            .build();
        // the builder only fails on an empty id
        Self::with_ovens(device.into_iter().collect())
    }
}

impl VirtualOvenChannel {
    /// A channel simulating exactly `devices`.
    #[must_use]
    pub fn with_ovens(devices: Vec<Device>) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let ovens = devices
            .into_iter()
            .map(|device| (device.id.clone(), VirtualOven::new(device)))
            .collect();
        Self {
            ovens: Arc::new(Mutex::new(ovens)),
            inbound,
            connected: AtomicBool::new(false),
            faults: Faults::default(),
            simulation: None,
            activity: Mutex::new(CancellationToken::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Let the ovens report preheat and stage completion on their own.
    #[must_use]
    pub fn with_simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = Some(simulation);
        self
    }

    /// Fail the next `count` connects.
    pub fn fail_next_connects(&self, count: u32) {
        self.faults.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` sends before they reach an oven.
    pub fn fail_next_sends(&self, count: u32) {
        self.faults.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Reject every command with `reason` until cleared with `None`.
    pub fn reject_commands(&self, reason: Option<&str>) {
        *self
            .faults
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }

    /// Accept commands without acknowledging them.
    pub fn set_silent(&self, silent: bool) {
        self.faults.silent.store(silent, Ordering::SeqCst);
    }

    /// Publish `event` as if `device_id` had sent it.
    pub fn emit(&self, device_id: &DeviceId, event: DeviceEvent) {
        publish(
            &self.inbound,
            Inbound::Device {
                device_id: device_id.clone(),
                event,
            },
        );
    }

    /// Put the oven into its error state and report the fault.
    pub fn inject_fault(&self, device_id: &DeviceId, message: &str) {
        if let Some(oven) = self.lock_ovens().get_mut(device_id) {
            oven.fault();
        }
        self.emit(
            device_id,
            DeviceEvent::Fault {
                message: message.to_string(),
            },
        );
    }

    /// Drop the connection as a server would.
    pub fn drop_connection(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.cancel_activity();
        publish(
            &self.inbound,
            Inbound::Closed {
                reason: reason.to_string(),
            },
        );
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Every command that reached an oven, oldest first.
    #[must_use]
    pub fn sent_commands(&self) -> Vec<CommandEnvelope> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn oven_state(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.lock_ovens()
            .get(device_id)
            .map(|oven| oven.device().state)
    }

    /// Probe target last set on `device_id`, in °C.
    #[must_use]
    pub fn probe_target(&self, device_id: &DeviceId) -> Option<f64> {
        self.lock_ovens()
            .get(device_id)
            .and_then(VirtualOven::probe_target)
    }

    fn lock_ovens(&self) -> std::sync::MutexGuard<'_, BTreeMap<DeviceId, VirtualOven>> {
        self.ovens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_activity(&self) {
        let mut activity = self
            .activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        activity.cancel();
        *activity = CancellationToken::new();
    }

    fn activity(&self) -> CancellationToken {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn deliver(&self, envelope: &CommandEnvelope) -> Result<Option<String>, VirtualError> {
        if !self.is_connected() {
            return Err(VirtualError::NotConnected);
        }
        if take_one(&self.faults.failing_sends) {
            return Err(VirtualError::Injected { operation: "send" });
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());

        let injected = self
            .faults
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if injected.is_some() {
            return Ok(injected);
        }

        let (reaction, report) = {
            let mut ovens = self.lock_ovens();
            let Some(oven) = ovens.get_mut(&envelope.device_id) else {
                return Ok(Some(format!("unknown device {}", envelope.device_id)));
            };
            match oven.apply(&envelope.command) {
                Ok(reaction) => (reaction, oven.report()),
                Err(reason) => return Ok(Some(reason)),
            }
        };
        self.emit(&envelope.device_id, DeviceEvent::StateUpdate(report));
        if let Some(simulation) = self.simulation {
            self.simulate(&simulation, &envelope.device_id, reaction);
        }
        Ok(None)
    }

    fn simulate(&self, simulation: &Simulation, device_id: &DeviceId, reaction: Reaction) {
        match reaction {
            Reaction::None => {}
            Reaction::Stage {
                cook_id,
                stage_index,
                last,
                target,
                countdown,
            } => {
                let ticker = self.ticker(device_id);
                tracing::debug!(%device_id, stage_index, target, "simulating preheat");
                let preheat = simulation.scaled(simulation.preheat);
                tokio::spawn(ticker.clone().run(preheat, move |oven| {
                    oven.reach_target(cook_id, stage_index)
                        .then(|| DeviceEvent::StateUpdate(oven.report()))
                }));
                if let Some(countdown) = countdown {
                    tokio::spawn(ticker.countdown(simulation.scaled(countdown), cook_id, stage_index, last));
                }
            }
            Reaction::Countdown {
                cook_id,
                stage_index,
                last,
                after,
            } => {
                let ticker = self.ticker(device_id);
                tokio::spawn(ticker.countdown(simulation.scaled(after), cook_id, stage_index, last));
            }
        }
    }

    fn ticker(&self, device_id: &DeviceId) -> Ticker {
        Ticker {
            device_id: device_id.clone(),
            ovens: Arc::clone(&self.ovens),
            inbound: self.inbound.clone(),
            activity: self.activity(),
        }
    }
}

/// One delayed notification from a simulated oven.
#[derive(Clone)]
struct Ticker {
    device_id: DeviceId,
    ovens: Arc<Mutex<BTreeMap<DeviceId, VirtualOven>>>,
    inbound: broadcast::Sender<Inbound>,
    activity: CancellationToken,
}

impl Ticker {
    async fn run(self, after: Duration, tick: impl FnOnce(&mut VirtualOven) -> Option<DeviceEvent>) {
        tokio::select! {
            () = self.activity.cancelled() => return,
            () = tokio::time::sleep(after) => {}
        }
        let event = {
            let mut ovens = self.ovens.lock().unwrap_or_else(PoisonError::into_inner);
            ovens.get_mut(&self.device_id).and_then(tick)
        };
        if let Some(event) = event {
            publish(
                &self.inbound,
                Inbound::Device {
                    device_id: self.device_id,
                    event,
                },
            );
        }
    }

    async fn countdown(self, after: Duration, cook_id: CookId, stage_index: usize, last: bool) {
        self.run(after, move |oven| {
            oven.complete_stage(cook_id, stage_index).then(|| {
                if last {
                    tracing::debug!(stage_index, "simulated cook finished");
                }
                DeviceEvent::StageComplete { stage_index }
            })
        })
        .await;
    }
}

fn publish(inbound: &broadcast::Sender<Inbound>, message: Inbound) {
    // no subscribers is fine
    let _ = inbound.send(message);
}

impl CommandChannel for VirtualOvenChannel {
    async fn connect(&self) -> Result<(), TransportError> {
        if take_one(&self.faults.failing_connects) {
            return Err(VirtualError::Injected {
                operation: "connect",
            }
            .into());
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn request_discovery(&self, accessories: &[String]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(VirtualError::NotConnected.into());
        }
        let devices: Vec<Device> = self
            .lock_ovens()
            .values()
            .map(|oven| oven.device().clone())
            .filter(|device| device.matches_accessories(accessories))
            .collect();
        publish(&self.inbound, Inbound::Discovered(devices));
        Ok(())
    }

    async fn send(&self, envelope: CommandEnvelope) -> Result<(), TransportError> {
        let rejection = self.deliver(&envelope)?;
        if let Some(reason) = &rejection {
            tracing::debug!(device_id = %envelope.device_id, %reason, "virtual oven rejected command");
        }
        if !self.faults.silent.load(Ordering::SeqCst) {
            self.emit(
                &envelope.device_id,
                DeviceEvent::Ack {
                    request_id: envelope.request_id,
                    rejection,
                },
            );
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.cancel_activity();
    }
}
