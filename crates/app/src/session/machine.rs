//! Pure session state machine.
//!
//! [`SessionMachine`] holds the connection state and the progress of the
//! active cook for one device. It performs no IO: callers feed it device
//! notifications and command outcomes, and it answers with the [`Effect`]
//! the driver has to carry out. A transition that depends on a command is
//! only committed once that command has been acknowledged.
//!
//! Notifications that do not fit the current state (stale stage indices,
//! duplicates, updates while idle) leave the machine untouched.

use std::fmt;

use ovenctl_domain::device::DeviceState;
use ovenctl_domain::error::{InvalidStateError, StageFailedError};
use ovenctl_domain::id::{CookId, DeviceId};
use ovenctl_domain::stage::{CookProgram, CookStage};

use crate::ports::DeviceReport;

/// What the connected oven is doing, as far as the session knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookPhase {
    Idle,
    Preheating,
    Cooking,
    Error,
}

impl fmt::Display for CookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Preheating => f.write_str("preheating"),
            Self::Cooking => f.write_str("cooking"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Connection state of a session, with the cook phase once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected(CookPhase),
    /// A transient failure is being retried; the phase is kept.
    Degraded(CookPhase),
}

impl SessionState {
    /// The cook phase, if connected or degraded.
    #[must_use]
    pub fn phase(&self) -> Option<CookPhase> {
        match self {
            Self::Connected(phase) | Self::Degraded(phase) => Some(*phase),
            Self::Disconnected | Self::Connecting => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected(phase) => write!(f, "connected ({phase})"),
            Self::Degraded(phase) => write!(f, "degraded ({phase})"),
        }
    }
}

/// Work the driver must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Submit the stage at `stage_index`, then commit with
    /// [`SessionMachine::on_stage_started`].
    SubmitStage { cook_id: CookId, stage_index: usize },
    /// Start the current stage's timer; the preheat wait is over.
    StartTimer { cook_id: CookId, stage_index: usize },
    /// The last stage finished and the session is idle again.
    CookCompleted { cook_id: CookId },
    /// The device reported a fault and the session is in error.
    Fault { message: String },
}

/// The most recent stage that could not be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
struct ActiveCook {
    cook_id: CookId,
    program: CookProgram,
    stage_index: usize,
    awaiting_preheat: bool,
    /// Next stage requested from the driver but not yet acknowledged.
    advancing_to: Option<usize>,
    /// The pending stage's preheat target was reported reached before its
    /// acknowledgement.
    reached_early: bool,
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    device_id: DeviceId,
    state: SessionState,
    cook: Option<ActiveCook>,
    retry_count: u32,
    last_failure: Option<StageFailure>,
}

impl SessionMachine {
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            state: SessionState::Disconnected,
            cook: None,
            retry_count: 0,
            last_failure: None,
        }
    }

    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn cook_id(&self) -> Option<CookId> {
        self.cook.as_ref().map(|cook| cook.cook_id)
    }

    #[must_use]
    pub fn program(&self) -> Option<&CookProgram> {
        self.cook.as_ref().map(|cook| &cook.program)
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<usize> {
        self.cook.as_ref().map(|cook| cook.stage_index)
    }

    #[must_use]
    pub fn is_awaiting_preheat(&self) -> bool {
        self.cook.as_ref().is_some_and(|cook| cook.awaiting_preheat)
    }

    /// Transient failures since the channel was last healthy.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn last_failure(&self) -> Option<&StageFailure> {
        self.last_failure.as_ref()
    }

    fn set_phase(&mut self, phase: CookPhase) {
        self.state = match self.state {
            SessionState::Degraded(_) => SessionState::Degraded(phase),
            _ => SessionState::Connected(phase),
        };
    }

    fn invalid(&self, operation: &'static str) -> InvalidStateError {
        InvalidStateError {
            device_id: self.device_id.clone(),
            operation,
            state: self.state.to_string(),
        }
    }

    // ── connection ──────────────────────────────────────────────────

    pub fn on_connecting(&mut self) {
        if self.state == SessionState::Disconnected {
            self.state = SessionState::Connecting;
        }
    }

    pub fn on_connected(&mut self) {
        self.state = match self.state {
            SessionState::Degraded(phase) | SessionState::Connected(phase) => {
                SessionState::Connected(phase)
            }
            SessionState::Disconnected | SessionState::Connecting => {
                SessionState::Connected(CookPhase::Idle)
            }
        };
        self.retry_count = 0;
    }

    pub fn on_transport_degraded(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
        if let SessionState::Connected(phase) = self.state {
            self.state = SessionState::Degraded(phase);
        }
    }

    pub fn on_transport_recovered(&mut self) {
        if let SessionState::Degraded(phase) = self.state {
            self.state = SessionState::Connected(phase);
        }
        self.retry_count = 0;
    }

    /// A connect or retried request was dropped before its outcome was
    /// known. `Connecting` falls back to `Disconnected` and `Degraded` to
    /// `Connected` with the same phase.
    pub fn on_retry_abandoned(&mut self) {
        self.state = match self.state {
            SessionState::Connecting => SessionState::Disconnected,
            SessionState::Degraded(phase) => SessionState::Connected(phase),
            state => state,
        };
    }

    /// Transport lost. Any running cook is forgotten; the device keeps
    /// running it on its own.
    pub fn on_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.cook = None;
    }

    // ── guards ──────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Unless the session is `Connected(Idle)`.
    pub fn ensure_can_start(&self) -> Result<(), InvalidStateError> {
        match self.state {
            SessionState::Connected(CookPhase::Idle) => Ok(()),
            _ => Err(self.invalid("start a cook")),
        }
    }

    /// # Errors
    ///
    /// Unless the session is connected and preheating, cooking or in error.
    pub fn ensure_can_stop(&self) -> Result<(), InvalidStateError> {
        match self.state {
            SessionState::Connected(
                CookPhase::Preheating | CookPhase::Cooking | CookPhase::Error,
            ) => Ok(()),
            _ => Err(self.invalid("stop")),
        }
    }

    /// # Errors
    ///
    /// Unless the session is connected, in any phase.
    pub fn ensure_connected(&self, operation: &'static str) -> Result<(), InvalidStateError> {
        match self.state {
            SessionState::Connected(_) => Ok(()),
            _ => Err(self.invalid(operation)),
        }
    }

    // ── cook progress ───────────────────────────────────────────────

    /// Stage 0 was acknowledged.
    ///
    /// The phase becomes `Preheating` when any stage of the program waits for
    /// preheat, `Cooking` otherwise.
    pub fn on_cook_started(&mut self, cook_id: CookId, program: CookProgram) {
        if self.state.phase().is_none() {
            return;
        }
        let awaiting_preheat = program
            .get(0)
            .is_some_and(CookStage::waits_for_preheat);
        let phase = if program.requires_preheat() {
            CookPhase::Preheating
        } else {
            CookPhase::Cooking
        };
        self.cook = Some(ActiveCook {
            cook_id,
            program,
            stage_index: 0,
            awaiting_preheat,
            advancing_to: None,
            reached_early: false,
        });
        self.last_failure = None;
        self.set_phase(phase);
    }

    /// A `target_reached` report for a when-preheated stage that is still
    /// being submitted is kept until [`take_early_preheat`](Self::take_early_preheat),
    /// provided the reported temperature meets that stage's target.
    pub fn on_state_update(&mut self, report: &DeviceReport) -> Option<Effect> {
        if !report.target_reached {
            return None;
        }
        let phase = self.state.phase();
        let cook = self.cook.as_mut()?;
        if let Some(pending) = cook.advancing_to {
            let reached = cook.program.get(pending).is_some_and(|stage| {
                stage.waits_for_preheat()
                    && report
                        .current_celsius
                        .is_some_and(|celsius| celsius >= stage.temperature().celsius())
            });
            cook.reached_early |= reached;
            return None;
        }
        if phase != Some(CookPhase::Preheating) {
            return None;
        }
        let effect = if cook.awaiting_preheat {
            cook.awaiting_preheat = false;
            Some(Effect::StartTimer {
                cook_id: cook.cook_id,
                stage_index: cook.stage_index,
            })
        } else {
            None
        };
        self.set_phase(CookPhase::Cooking);
        effect
    }

    pub fn on_stage_complete(&mut self, stage_index: usize) -> Option<Effect> {
        if !matches!(
            self.state.phase(),
            Some(CookPhase::Preheating | CookPhase::Cooking)
        ) {
            return None;
        }
        let cook = self.cook.as_mut()?;
        if cook.stage_index != stage_index || cook.advancing_to.is_some() {
            return None;
        }
        let next = stage_index + 1;
        if next < cook.program.len() {
            cook.advancing_to = Some(next);
            return Some(Effect::SubmitStage {
                cook_id: cook.cook_id,
                stage_index: next,
            });
        }
        let cook_id = cook.cook_id;
        self.cook = None;
        self.set_phase(CookPhase::Idle);
        Some(Effect::CookCompleted { cook_id })
    }

    /// The stage the driver should submit for a pending [`Effect::SubmitStage`].
    ///
    /// `None` when the advance was overtaken (stop, fault, disconnect).
    #[must_use]
    pub fn stage_to_submit(&self, stage_index: usize) -> Option<(CookId, CookStage, usize)> {
        let cook = self.cook.as_ref()?;
        if cook.advancing_to != Some(stage_index) {
            return None;
        }
        let stage = cook.program.get(stage_index)?.clone();
        Some((cook.cook_id, stage, cook.program.len()))
    }

    /// Commit a stage advance after the device acknowledged it.
    ///
    /// Returns `false` when the advance is no longer pending.
    pub fn on_stage_started(&mut self, stage_index: usize) -> bool {
        let Some(cook) = self.cook.as_mut() else {
            return false;
        };
        if cook.advancing_to != Some(stage_index) {
            return false;
        }
        let waits = cook
            .program
            .get(stage_index)
            .is_some_and(CookStage::waits_for_preheat);
        cook.stage_index = stage_index;
        cook.advancing_to = None;
        cook.awaiting_preheat = waits;
        cook.reached_early &= waits;
        self.set_phase(if waits {
            CookPhase::Preheating
        } else {
            CookPhase::Cooking
        });
        true
    }

    /// Start the timer of a stage whose preheat target was reached while it
    /// was being submitted. Call right after [`on_stage_started`](Self::on_stage_started).
    pub fn take_early_preheat(&mut self) -> Option<Effect> {
        let cook = self.cook.as_mut()?;
        if !std::mem::take(&mut cook.reached_early) || !cook.awaiting_preheat {
            return None;
        }
        cook.awaiting_preheat = false;
        let effect = Effect::StartTimer {
            cook_id: cook.cook_id,
            stage_index: cook.stage_index,
        };
        self.set_phase(CookPhase::Cooking);
        Some(effect)
    }

    pub fn on_fault(&mut self, message: String) -> Option<Effect> {
        match self.state.phase() {
            None | Some(CookPhase::Error) => None,
            Some(_) => {
                if let Some(cook) = self.cook.as_mut() {
                    cook.advancing_to = None;
                    cook.awaiting_preheat = false;
                    cook.reached_early = false;
                }
                self.set_phase(CookPhase::Error);
                Some(Effect::Fault { message })
            }
        }
    }

    /// A stage command failed for good. A connected session moves to error;
    /// a disconnected one stays disconnected.
    pub fn on_stage_failed(&mut self, stage_index: usize, reason: String) -> StageFailedError {
        if let Some(cook) = self.cook.as_mut() {
            cook.advancing_to = None;
            cook.awaiting_preheat = false;
            cook.reached_early = false;
        }
        if self.state.phase().is_some() {
            self.set_phase(CookPhase::Error);
        }
        self.last_failure = Some(StageFailure {
            stage_index,
            reason: reason.clone(),
        });
        StageFailedError {
            device_id: self.device_id.clone(),
            stage_index,
            reason,
        }
    }

    /// The stop command was acknowledged.
    pub fn on_stopped(&mut self) {
        self.cook = None;
        if self.state.phase().is_some() {
            self.set_phase(CookPhase::Idle);
        }
    }

    /// Mirror the phase the device reports while this session runs no cook
    /// of its own, e.g. one started by another client.
    pub fn on_remote_state(&mut self, state: DeviceState) {
        if self.cook.is_some() {
            return;
        }
        let Some(phase) = self.state.phase() else {
            return;
        };
        let adopted = match (phase, state) {
            (CookPhase::Idle | CookPhase::Preheating, DeviceState::Preheating) => {
                CookPhase::Preheating
            }
            (CookPhase::Idle | CookPhase::Preheating | CookPhase::Cooking, DeviceState::Cooking) => {
                CookPhase::Cooking
            }
            (CookPhase::Preheating | CookPhase::Cooking, DeviceState::Idle) => CookPhase::Idle,
            _ => return,
        };
        self.set_phase(adopted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovenctl_domain::temperature::Temperature;
    use ovenctl_domain::timer::Timer;

    fn stage(celsius: f64, timer: Option<Timer>) -> CookStage {
        let mut builder = CookStage::builder(Temperature::from_celsius(celsius).unwrap());
        if let Some(timer) = timer {
            builder = builder.timer(timer);
        }
        builder.build().unwrap()
    }

    fn program(stages: Vec<CookStage>) -> CookProgram {
        CookProgram::new(stages).unwrap()
    }

    fn connected() -> SessionMachine {
        let mut machine = SessionMachine::new(DeviceId::new("oven-1"));
        machine.on_connecting();
        machine.on_connected();
        machine
    }

    fn reached() -> DeviceReport {
        DeviceReport {
            state: DeviceState::Preheating,
            current_celsius: Some(200.0),
            target_reached: true,
        }
    }

    #[test]
    fn should_start_disconnected_and_connect_to_idle() {
        let mut machine = SessionMachine::new(DeviceId::new("oven-1"));
        assert_eq!(machine.state(), SessionState::Disconnected);
        machine.on_connecting();
        assert_eq!(machine.state(), SessionState::Connecting);
        machine.on_connected();
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
    }

    #[test]
    fn should_reject_start_when_not_idle() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        let err = machine.ensure_can_start().unwrap_err();
        assert_eq!(err.state, "connected (cooking)");
        assert!(SessionMachine::new(DeviceId::new("x")).ensure_can_start().is_err());
    }

    #[test]
    fn should_enter_cooking_when_no_stage_waits_for_preheat() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));
        assert_eq!(machine.current_stage(), Some(0));
    }

    #[test]
    fn should_start_timer_when_preheat_target_reached() {
        let mut machine = connected();
        let cook_id = CookId::new();
        machine.on_cook_started(
            cook_id,
            program(vec![stage(200.0, Some(Timer::when_preheated(600).unwrap()))]),
        );
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Preheating));
        assert!(machine.is_awaiting_preheat());

        let effect = machine.on_state_update(&reached());
        assert_eq!(
            effect,
            Some(Effect::StartTimer {
                cook_id,
                stage_index: 0
            })
        );
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));
        assert_eq!(machine.on_state_update(&reached()), None);
    }

    #[test]
    fn should_ignore_state_update_that_has_not_reached_target() {
        let mut machine = connected();
        machine.on_cook_started(
            CookId::new(),
            program(vec![stage(200.0, Some(Timer::when_preheated(600).unwrap()))]),
        );
        let report = DeviceReport {
            target_reached: false,
            ..reached()
        };
        assert_eq!(machine.on_state_update(&report), None);
        assert!(machine.is_awaiting_preheat());
    }

    #[test]
    fn should_advance_through_stages_in_order_and_finish_idle() {
        let mut machine = connected();
        let cook_id = CookId::new();
        machine.on_cook_started(
            cook_id,
            program(vec![
                stage(100.0, Some(Timer::immediate(60).unwrap())),
                stage(200.0, Some(Timer::when_preheated(60).unwrap())),
                stage(150.0, Some(Timer::immediate(60).unwrap())),
            ]),
        );

        assert_eq!(
            machine.on_stage_complete(0),
            Some(Effect::SubmitStage {
                cook_id,
                stage_index: 1
            })
        );
        let (_, submitted, total) = machine.stage_to_submit(1).unwrap();
        assert_eq!(submitted.temperature().celsius(), 200.0);
        assert_eq!(total, 3);
        assert!(machine.on_stage_started(1));
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Preheating));

        machine.on_state_update(&reached());
        assert_eq!(
            machine.on_stage_complete(1),
            Some(Effect::SubmitStage {
                cook_id,
                stage_index: 2
            })
        );
        assert!(machine.on_stage_started(2));
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));

        assert_eq!(
            machine.on_stage_complete(2),
            Some(Effect::CookCompleted { cook_id })
        );
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
        assert!(machine.cook_id().is_none());
    }

    #[test]
    fn should_start_timer_when_target_reached_before_stage_acknowledged() {
        let mut machine = connected();
        let cook_id = CookId::new();
        machine.on_cook_started(
            cook_id,
            program(vec![
                stage(100.0, Some(Timer::immediate(60).unwrap())),
                stage(200.0, Some(Timer::when_preheated(600).unwrap())),
            ]),
        );
        machine.on_stage_complete(0);

        assert_eq!(machine.on_state_update(&reached()), None);
        assert!(machine.on_stage_started(1));
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Preheating));
        assert_eq!(
            machine.take_early_preheat(),
            Some(Effect::StartTimer {
                cook_id,
                stage_index: 1
            })
        );
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));
        assert!(!machine.is_awaiting_preheat());
        assert_eq!(machine.take_early_preheat(), None);
    }

    #[test]
    fn should_not_keep_early_report_below_pending_stage_target() {
        let mut machine = connected();
        machine.on_cook_started(
            CookId::new(),
            program(vec![
                stage(100.0, Some(Timer::immediate(60).unwrap())),
                stage(200.0, Some(Timer::when_preheated(600).unwrap())),
            ]),
        );
        machine.on_stage_complete(0);
        let previous_target = DeviceReport {
            current_celsius: Some(100.0),
            ..reached()
        };

        assert_eq!(machine.on_state_update(&previous_target), None);
        assert!(machine.on_stage_started(1));
        assert_eq!(machine.take_early_preheat(), None);
        assert!(machine.is_awaiting_preheat());
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Preheating));
    }

    #[test]
    fn should_roll_back_abandoned_connect_and_retry() {
        let mut machine = SessionMachine::new(DeviceId::new("oven-1"));
        machine.on_connecting();
        machine.on_retry_abandoned();
        assert_eq!(machine.state(), SessionState::Disconnected);

        let mut machine = connected();
        machine.on_transport_degraded();
        assert_eq!(machine.state(), SessionState::Degraded(CookPhase::Idle));
        machine.on_retry_abandoned();
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
        assert!(machine.ensure_can_start().is_ok());

        machine.on_retry_abandoned();
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
    }

    #[test]
    fn should_ignore_duplicate_and_stale_stage_completions() {
        let mut machine = connected();
        machine.on_cook_started(
            CookId::new(),
            program(vec![stage(100.0, None), stage(120.0, None), stage(140.0, None)]),
        );
        assert!(machine.on_stage_complete(0).is_some());
        assert_eq!(machine.on_stage_complete(0), None, "duplicate while advancing");
        assert!(machine.on_stage_started(1));
        assert_eq!(machine.on_stage_complete(0), None, "stale");
        assert_eq!(machine.on_stage_complete(2), None, "ahead of current");
        assert_eq!(machine.current_stage(), Some(1));
    }

    #[test]
    fn should_ignore_stage_completion_when_idle() {
        let mut machine = connected();
        assert_eq!(machine.on_stage_complete(0), None);
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
    }

    #[test]
    fn should_move_to_error_on_fault_once() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        assert_eq!(
            machine.on_fault("door open".to_string()),
            Some(Effect::Fault {
                message: "door open".to_string()
            })
        );
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Error));
        assert_eq!(machine.on_fault("door open".to_string()), None);
        assert!(machine.ensure_can_stop().is_ok());
    }

    #[test]
    fn should_record_stage_failure_and_enter_error() {
        let mut machine = connected();
        machine.on_cook_started(
            CookId::new(),
            program(vec![stage(100.0, None), stage(120.0, None)]),
        );
        machine.on_stage_complete(0);
        let err = machine.on_stage_failed(1, "rejected".to_string());
        assert_eq!(err.stage_index, 1);
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Error));
        assert_eq!(machine.last_failure().map(|f| f.stage_index), Some(1));
        assert!(machine.stage_to_submit(1).is_none());
        assert!(!machine.on_stage_started(1));
    }

    #[test]
    fn should_keep_phase_while_degraded() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        machine.on_transport_degraded();
        assert_eq!(machine.state(), SessionState::Degraded(CookPhase::Cooking));
        assert_eq!(machine.retry_count(), 1);
        machine.on_transport_recovered();
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));
        assert_eq!(machine.retry_count(), 0);
    }

    #[test]
    fn should_forget_cook_on_disconnect() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        machine.on_disconnected();
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.program().is_none());
        assert!(machine.ensure_can_stop().is_err());
    }

    #[test]
    fn should_reject_stop_when_idle() {
        let machine = connected();
        let err = machine.ensure_can_stop().unwrap_err();
        assert_eq!(err.operation, "stop");
    }

    #[test]
    fn should_return_to_idle_when_stopped() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        machine.on_stopped();
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
        assert!(machine.ensure_can_start().is_ok());
    }

    #[test]
    fn should_adopt_remote_cook_when_idle() {
        let mut machine = connected();
        machine.on_remote_state(DeviceState::Cooking);
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));
        assert!(machine.cook_id().is_none());
        assert!(machine.ensure_can_stop().is_ok());
        assert!(machine.ensure_can_start().is_err());

        machine.on_remote_state(DeviceState::Idle);
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Idle));
    }

    #[test]
    fn should_ignore_remote_state_while_running_own_cook() {
        let mut machine = connected();
        machine.on_cook_started(CookId::new(), program(vec![stage(180.0, None)]));
        machine.on_remote_state(DeviceState::Idle);
        assert_eq!(machine.state(), SessionState::Connected(CookPhase::Cooking));
    }

    #[test]
    fn should_ignore_remote_state_when_disconnected() {
        let mut machine = SessionMachine::new(DeviceId::new("oven-1"));
        machine.on_remote_state(DeviceState::Cooking);
        assert_eq!(machine.state(), SessionState::Disconnected);
    }
}
