//! Cook stages and cook programs.
//!
//! A [`CookStage`] is one step of a cook: a setpoint, how the cavity is heated
//! and humidified, and optionally how long to hold it. A [`CookProgram`] is the
//! ordered, non-empty list of stages sent to a device. Execution order is the
//! list order and nothing downstream reorders it.
//!
//! Only physically impossible values are rejected. Combinations that are
//! merely unusual (dry heat with steam, wet-bulb without steam, no element
//! powered) are accepted and reported through [`CookStage::warnings`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::heating::HeatingElements;
use crate::steam::{SteamMode, SteamSettings};
use crate::temperature::Temperature;
use crate::timer::Timer;

/// Highest wet-bulb setpoint in °C; water boils above it at sea level.
pub const MAX_WET_BULB_CELSIUS: f64 = 100.0;
/// Fan speed used when a stage does not set one.
pub const DEFAULT_FAN_SPEED: u8 = 100;
/// Title used when a stage is built without one.
pub const DEFAULT_STAGE_TITLE: &str = "Stage";

/// Which probe regulates the cavity temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureMode {
    /// Dry-bulb: regulate on air temperature.
    #[default]
    #[serde(rename = "DRY", alias = "dry")]
    Dry,
    /// Wet-bulb: regulate on the humidity-compensated temperature.
    #[serde(rename = "WET", alias = "wet")]
    Wet,
}

impl fmt::Display for TemperatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dry => f.write_str("dry"),
            Self::Wet => f.write_str("wet"),
        }
    }
}

/// A stage setting that is allowed but probably not what the author meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageWarning {
    DryModeWithSteam,
    WetModeWithoutSteam,
    RelativeHumidityInDryMode,
    NoHeatingElementActive,
}

impl fmt::Display for StageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::DryModeWithSteam => "steam is set but the stage uses dry-bulb mode",
            Self::WetModeWithoutSteam => "wet-bulb mode without steam will not reach setpoint",
            Self::RelativeHumidityInDryMode => {
                "relative-humidity steam is only regulated in wet-bulb mode"
            }
            Self::NoHeatingElementActive => "no heating element is active",
        };
        f.write_str(message)
    }
}

/// One validated step of a cook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookStage {
    temperature: Temperature,
    mode: TemperatureMode,
    heating_elements: HeatingElements,
    steam: Option<SteamSettings>,
    timer: Option<Timer>,
    title: String,
    description: Option<String>,
    fan_speed: u8,
    vent_open: bool,
    rack_position: Option<u8>,
}

impl CookStage {
    /// Start building a stage around its setpoint.
    #[must_use]
    pub fn builder(temperature: Temperature) -> CookStageBuilder {
        CookStageBuilder::new(temperature)
    }

    #[must_use]
    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    #[must_use]
    pub fn mode(&self) -> TemperatureMode {
        self.mode
    }

    #[must_use]
    pub fn heating_elements(&self) -> HeatingElements {
        self.heating_elements
    }

    #[must_use]
    pub fn steam(&self) -> Option<SteamSettings> {
        self.steam
    }

    #[must_use]
    pub fn timer(&self) -> Option<Timer> {
        self.timer
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn fan_speed(&self) -> u8 {
        self.fan_speed
    }

    #[must_use]
    pub fn vent_open(&self) -> bool {
        self.vent_open
    }

    #[must_use]
    pub fn rack_position(&self) -> Option<u8> {
        self.rack_position
    }

    /// Whether the stage timer is held until the cavity reaches setpoint.
    #[must_use]
    pub fn waits_for_preheat(&self) -> bool {
        self.timer.is_some_and(|timer| timer.waits_for_preheat())
    }

    /// Unusual but accepted combinations in this stage.
    #[must_use]
    pub fn warnings(&self) -> Vec<StageWarning> {
        let mut warnings = Vec::new();
        match (self.mode, self.steam) {
            (TemperatureMode::Dry, Some(steam)) => {
                warnings.push(StageWarning::DryModeWithSteam);
                if steam.mode() == SteamMode::RelativeHumidity {
                    warnings.push(StageWarning::RelativeHumidityInDryMode);
                }
            }
            (TemperatureMode::Wet, None) => warnings.push(StageWarning::WetModeWithoutSteam),
            _ => {}
        }
        if !self.heating_elements.is_any_active() {
            warnings.push(StageWarning::NoHeatingElementActive);
        }
        warnings
    }
}

impl fmt::Display for CookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.title, self.temperature, self.mode)?;
        if let Some(steam) = self.steam {
            write!(f, ", {steam}")?;
        }
        if let Some(timer) = self.timer {
            write!(f, ", {timer}")?;
            if timer.waits_for_preheat() {
                f.write_str(" after preheat")?;
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`CookStage`].
#[derive(Debug, Clone)]
pub struct CookStageBuilder {
    temperature: Temperature,
    mode: TemperatureMode,
    heating_elements: HeatingElements,
    steam: Option<SteamSettings>,
    timer: Option<Timer>,
    title: Option<String>,
    description: Option<String>,
    fan_speed: u8,
    vent_open: bool,
    rack_position: Option<u8>,
}

impl CookStageBuilder {
    fn new(temperature: Temperature) -> Self {
        Self {
            temperature,
            mode: TemperatureMode::default(),
            heating_elements: HeatingElements::default(),
            steam: None,
            timer: None,
            title: None,
            description: None,
            fan_speed: DEFAULT_FAN_SPEED,
            vent_open: false,
            rack_position: None,
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: TemperatureMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn heating_elements(mut self, heating_elements: HeatingElements) -> Self {
        self.heating_elements = heating_elements;
        self
    }

    #[must_use]
    pub fn steam(mut self, steam: SteamSettings) -> Self {
        self.steam = Some(steam);
        self
    }

    #[must_use]
    pub fn timer(mut self, timer: Timer) -> Self {
        self.timer = Some(timer);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn fan_speed(mut self, fan_speed: u8) -> Self {
        self.fan_speed = fan_speed;
        self
    }

    #[must_use]
    pub fn vent_open(mut self, vent_open: bool) -> Self {
        self.vent_open = vent_open;
        self
    }

    #[must_use]
    pub fn rack_position(mut self, rack_position: u8) -> Self {
        self.rack_position = Some(rack_position);
        self
    }

    /// Consume the builder, validate, and return a [`CookStage`].
    ///
    /// # Errors
    ///
    /// - [`ValidationError::WetBulbTooHot`] in wet mode above 100 °C
    /// - [`ValidationError::FanSpeedOutOfRange`] above 100
    /// - [`ValidationError::RackPositionOutOfRange`] outside 1–5
    pub fn build(self) -> Result<CookStage, ValidationError> {
        let celsius = self.temperature.celsius();
        if self.mode == TemperatureMode::Wet && celsius > MAX_WET_BULB_CELSIUS {
            return Err(ValidationError::WetBulbTooHot { celsius });
        }
        if self.fan_speed > 100 {
            return Err(ValidationError::FanSpeedOutOfRange(self.fan_speed));
        }
        if let Some(rack) = self.rack_position
            && !(1..=5).contains(&rack)
        {
            return Err(ValidationError::RackPositionOutOfRange(rack));
        }
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STAGE_TITLE.to_string());

        Ok(CookStage {
            temperature: self.temperature,
            mode: self.mode,
            heating_elements: self.heating_elements,
            steam: self.steam,
            timer: self.timer,
            title,
            description: self.description,
            fan_speed: self.fan_speed,
            vent_open: self.vent_open,
            rack_position: self.rack_position,
        })
    }
}

/// Ordered, non-empty list of stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CookProgram {
    stages: Vec<CookStage>,
}

impl CookProgram {
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyProgram`] when `stages` is empty.
    pub fn new(stages: Vec<CookStage>) -> Result<Self, ValidationError> {
        if stages.is_empty() {
            return Err(ValidationError::EmptyProgram);
        }
        Ok(Self { stages })
    }

    /// One dry stage on the rear element at full fan, optionally timed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroTimerDuration`] for `Some(0)`.
    pub fn simple(
        temperature: Temperature,
        duration_secs: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let mut builder = CookStage::builder(temperature).title("Cook");
        if let Some(seconds) = duration_secs {
            builder = builder.timer(Timer::immediate(seconds)?);
        }
        Self::new(vec![builder.build()?])
    }

    #[must_use]
    pub fn stages(&self) -> &[CookStage] {
        &self.stages
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CookStage> {
        self.stages.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Never true for a constructed program.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whether any stage holds its timer until the cavity is up to temperature.
    #[must_use]
    pub fn requires_preheat(&self) -> bool {
        self.stages.iter().any(CookStage::waits_for_preheat)
    }

    /// Sum of all stage timers, `None` if any stage runs indefinitely.
    #[must_use]
    pub fn total_duration_secs(&self) -> Option<u64> {
        self.stages
            .iter()
            .map(|stage| stage.timer().map(|timer| u64::from(timer.initial())))
            .sum()
    }
}

impl<'a> IntoIterator for &'a CookProgram {
    type Item = &'a CookStage;
    type IntoIter = std::slice::Iter<'a, CookStage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn celsius(value: f64) -> Temperature {
        Temperature::from_celsius(value).unwrap()
    }

    #[test]
    fn should_apply_defaults_when_only_temperature_given() {
        let stage = CookStage::builder(celsius(180.0)).build().unwrap();
        assert_eq!(stage.mode(), TemperatureMode::Dry);
        assert_eq!(stage.heating_elements(), HeatingElements::default());
        assert_eq!(stage.fan_speed(), DEFAULT_FAN_SPEED);
        assert_eq!(stage.title(), DEFAULT_STAGE_TITLE);
        assert!(!stage.vent_open());
        assert!(stage.timer().is_none());
        assert!(stage.warnings().is_empty());
    }

    #[test]
    fn should_reject_wet_bulb_above_boiling() {
        let result = CookStage::builder(celsius(120.0))
            .mode(TemperatureMode::Wet)
            .steam(SteamSettings::relative_humidity(100).unwrap())
            .build();
        assert_eq!(result, Err(ValidationError::WetBulbTooHot { celsius: 120.0 }));
    }

    #[test]
    fn should_warn_but_accept_dry_mode_with_relative_humidity_steam() {
        let stage = CookStage::builder(celsius(200.0))
            .steam(SteamSettings::relative_humidity(30).unwrap())
            .build()
            .unwrap();
        assert_eq!(
            stage.warnings(),
            vec![
                StageWarning::DryModeWithSteam,
                StageWarning::RelativeHumidityInDryMode
            ]
        );
    }

    #[test]
    fn should_warn_when_wet_mode_has_no_steam() {
        let stage = CookStage::builder(celsius(60.0))
            .mode(TemperatureMode::Wet)
            .build()
            .unwrap();
        assert_eq!(stage.warnings(), vec![StageWarning::WetModeWithoutSteam]);
    }

    #[test]
    fn should_warn_when_no_heating_element_active() {
        let stage = CookStage::builder(celsius(60.0))
            .heating_elements(HeatingElements::new(false, false, false).unwrap())
            .build()
            .unwrap();
        assert_eq!(stage.warnings(), vec![StageWarning::NoHeatingElementActive]);
    }

    #[test]
    fn should_reject_fan_speed_above_hundred() {
        let result = CookStage::builder(celsius(180.0)).fan_speed(101).build();
        assert_eq!(result, Err(ValidationError::FanSpeedOutOfRange(101)));
    }

    #[test]
    fn should_reject_rack_position_outside_range() {
        let result = CookStage::builder(celsius(180.0)).rack_position(0).build();
        assert_eq!(result, Err(ValidationError::RackPositionOutOfRange(0)));
    }

    #[test]
    fn should_fall_back_to_default_title_when_blank() {
        let stage = CookStage::builder(celsius(180.0)).title("  ").build().unwrap();
        assert_eq!(stage.title(), DEFAULT_STAGE_TITLE);
    }

    #[test]
    fn should_reject_empty_program() {
        assert_eq!(CookProgram::new(vec![]), Err(ValidationError::EmptyProgram));
    }

    #[test]
    fn should_keep_stage_order() {
        let stages: Vec<_> = [100.0, 200.0, 150.0]
            .into_iter()
            .map(|c| CookStage::builder(celsius(c)).build().unwrap())
            .collect();
        let program = CookProgram::new(stages).unwrap();
        let order: Vec<f64> = program
            .into_iter()
            .map(|stage| stage.temperature().celsius())
            .collect();
        assert_eq!(order, vec![100.0, 200.0, 150.0]);
    }

    #[test]
    fn should_build_simple_program_with_immediate_timer() {
        let program = CookProgram::simple(celsius(200.0), Some(1800)).unwrap();
        assert_eq!(program.len(), 1);
        let stage = &program.stages()[0];
        assert_eq!(stage.timer(), Some(Timer::immediate(1800).unwrap()));
        assert!(!program.requires_preheat());
        assert_eq!(program.total_duration_secs(), Some(1800));
    }

    #[test]
    fn should_require_preheat_when_any_stage_waits_for_it() {
        let first = CookStage::builder(celsius(100.0)).build().unwrap();
        let second = CookStage::builder(celsius(220.0))
            .timer(Timer::when_preheated(600).unwrap())
            .build()
            .unwrap();
        let program = CookProgram::new(vec![first, second]).unwrap();
        assert!(program.requires_preheat());
        assert_eq!(program.total_duration_secs(), None);
    }

    #[test]
    fn should_display_stage_summary() {
        let stage = CookStage::builder(celsius(220.0))
            .title("Sear")
            .timer(Timer::when_preheated(300).unwrap())
            .build()
            .unwrap();
        assert_eq!(stage.to_string(), "Sear: 220°C dry, 5m 0s after preheat");
    }
}
