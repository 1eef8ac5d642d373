//! Stage timer.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// When the countdown of a stage timer begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStartType {
    /// Count down as soon as the stage starts.
    #[default]
    #[serde(alias = "immediate")]
    Immediately,
    /// Hold the countdown until the cavity reaches the stage setpoint.
    #[serde(alias = "when-preheated")]
    WhenPreheated,
}

impl fmt::Display for TimerStartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediately => f.write_str("immediately"),
            Self::WhenPreheated => f.write_str("when preheated"),
        }
    }
}

/// A positive countdown duration with its start trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Timer {
    initial: u32,
    start_type: TimerStartType,
}

impl Timer {
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroTimerDuration`] when `seconds` is 0.
    pub fn new(seconds: u32, start_type: TimerStartType) -> Result<Self, ValidationError> {
        if seconds == 0 {
            return Err(ValidationError::ZeroTimerDuration);
        }
        Ok(Self {
            initial: seconds,
            start_type,
        })
    }

    /// # Errors
    ///
    /// See [`Timer::new`].
    pub fn immediate(seconds: u32) -> Result<Self, ValidationError> {
        Self::new(seconds, TimerStartType::Immediately)
    }

    /// # Errors
    ///
    /// See [`Timer::new`].
    pub fn when_preheated(seconds: u32) -> Result<Self, ValidationError> {
        Self::new(seconds, TimerStartType::WhenPreheated)
    }

    /// Initial duration in seconds.
    #[must_use]
    pub fn initial(&self) -> u32 {
        self.initial
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.initial))
    }

    #[must_use]
    pub fn start_type(&self) -> TimerStartType {
        self.start_type
    }

    #[must_use]
    pub fn waits_for_preheat(&self) -> bool {
        self.start_type == TimerStartType::WhenPreheated
    }
}

/// Human-readable `1h 5m 0s` / `30m 0s` / `45s`.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.initial / 3600;
        let minutes = (self.initial % 3600) / 60;
        let seconds = self.initial % 60;
        if hours > 0 {
            write!(f, "{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            write!(f, "{minutes}m {seconds}s")
        } else {
            write!(f, "{seconds}s")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_zero_duration() {
        assert_eq!(Timer::immediate(0), Err(ValidationError::ZeroTimerDuration));
    }

    #[test]
    fn should_default_start_type_to_immediately() {
        assert_eq!(TimerStartType::default(), TimerStartType::Immediately);
    }

    #[test]
    fn should_report_preheat_wait_only_for_when_preheated() {
        assert!(Timer::when_preheated(60).unwrap().waits_for_preheat());
        assert!(!Timer::immediate(60).unwrap().waits_for_preheat());
    }

    #[test]
    fn should_format_minutes_and_seconds() {
        assert_eq!(Timer::immediate(1800).unwrap().to_string(), "30m 0s");
        assert_eq!(Timer::immediate(3905).unwrap().to_string(), "1h 5m 5s");
        assert_eq!(Timer::immediate(45).unwrap().to_string(), "45s");
    }

    #[test]
    fn should_deserialize_start_type_aliases() {
        let start: TimerStartType = serde_json::from_str("\"when-preheated\"").unwrap();
        assert_eq!(start, TimerStartType::WhenPreheated);
    }
}
