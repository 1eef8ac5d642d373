//! Simulated oven: tracks what the last command asked for.

use std::time::Duration;

use ovenctl_app::ports::{DeviceReport, OvenCommand};
use ovenctl_domain::device::{Device, DeviceState};
use ovenctl_domain::id::CookId;

/// Cavity temperature of an oven that has been off for a while.
pub(crate) const AMBIENT_CELSIUS: f64 = 22.0;

/// What the simulation has to schedule after a command was accepted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reaction {
    /// Nothing to simulate.
    None,
    /// A stage started: heat towards `target`, and count down `countdown`
    /// from now when the timer starts immediately.
    Stage {
        cook_id: CookId,
        stage_index: usize,
        last: bool,
        target: f64,
        countdown: Option<Duration>,
    },
    /// A held timer was released.
    Countdown {
        cook_id: CookId,
        stage_index: usize,
        last: bool,
        after: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RunningStage {
    cook_id: CookId,
    stage_index: usize,
    last: bool,
}

pub(crate) struct VirtualOven {
    device: Device,
    celsius: f64,
    target: Option<f64>,
    probe: Option<f64>,
    running: Option<RunningStage>,
}

impl VirtualOven {
    pub(crate) fn new(mut device: Device) -> Self {
        device.state = DeviceState::Idle;
        device.current_temperature = Some(AMBIENT_CELSIUS);
        Self {
            device,
            celsius: AMBIENT_CELSIUS,
            target: None,
            probe: None,
            running: None,
        }
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn probe_target(&self) -> Option<f64> {
        self.probe
    }

    pub(crate) fn report(&self) -> DeviceReport {
        DeviceReport {
            state: self.device.state,
            current_celsius: Some(self.celsius),
            target_reached: self.target.is_some_and(|target| self.celsius >= target),
        }
    }

    /// Apply an accepted command, or return the firmware's rejection reason.
    pub(crate) fn apply(&mut self, command: &OvenCommand) -> Result<Reaction, String> {
        match command {
            OvenCommand::StartStage {
                cook_id,
                stage_index,
                stage_count,
                stage,
            } => {
                if let Some(running) = self.running
                    && running.cook_id != *cook_id
                    && *stage_index > 0
                {
                    return Err("stage belongs to another cook".to_string());
                }
                let target = stage.temperature().celsius();
                let last = stage_index + 1 >= *stage_count;
                self.target = Some(target);
                self.running = Some(RunningStage {
                    cook_id: *cook_id,
                    stage_index: *stage_index,
                    last,
                });
                self.set_state(if self.celsius >= target {
                    DeviceState::Cooking
                } else {
                    DeviceState::Preheating
                });
                let countdown = stage
                    .timer()
                    .filter(|timer| !timer.waits_for_preheat())
                    .map(|timer| timer.duration());
                Ok(Reaction::Stage {
                    cook_id: *cook_id,
                    stage_index: *stage_index,
                    last,
                    target,
                    countdown,
                })
            }
            OvenCommand::StartTimer {
                cook_id,
                stage_index,
                timer,
            } => match self.running {
                Some(running)
                    if running.cook_id == *cook_id && running.stage_index == *stage_index =>
                {
                    Ok(Reaction::Countdown {
                        cook_id: *cook_id,
                        stage_index: *stage_index,
                        last: running.last,
                        after: timer.duration(),
                    })
                }
                _ => Err("timer for a stage that is not running".to_string()),
            },
            OvenCommand::Stop { .. } => {
                self.finish();
                Ok(Reaction::None)
            }
            OvenCommand::SetProbe { target } => {
                self.probe = Some(target.temperature().celsius());
                Ok(Reaction::None)
            }
        }
    }

    /// The cavity reached `target`. Returns `false` when the stage that asked
    /// for it is no longer running.
    pub(crate) fn reach_target(&mut self, cook_id: CookId, stage_index: usize) -> bool {
        if !self.is_running(cook_id, stage_index) {
            return false;
        }
        if let Some(target) = self.target {
            self.celsius = target;
        }
        self.set_state(DeviceState::Cooking);
        true
    }

    /// The stage timer ran out. Returns `false` when the stage is no longer
    /// running.
    pub(crate) fn complete_stage(&mut self, cook_id: CookId, stage_index: usize) -> bool {
        let Some(running) = self.running else {
            return false;
        };
        if running.cook_id != cook_id || running.stage_index != stage_index {
            return false;
        }
        if running.last {
            self.finish();
        }
        true
    }

    pub(crate) fn fault(&mut self) {
        self.running = None;
        self.set_state(DeviceState::Error);
    }

    fn is_running(&self, cook_id: CookId, stage_index: usize) -> bool {
        self.running
            .is_some_and(|running| running.cook_id == cook_id && running.stage_index == stage_index)
    }

    fn finish(&mut self) {
        self.running = None;
        self.target = None;
        self.set_state(DeviceState::Idle);
    }

    fn set_state(&mut self, state: DeviceState) {
        self.device.state = state;
        self.device.current_temperature = Some(self.celsius);
    }
}
