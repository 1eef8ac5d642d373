//! Ready-made cook programs for common techniques.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::heating::HeatingElements;
use crate::stage::{CookProgram, CookStage, TemperatureMode};
use crate::steam::SteamSettings;
use crate::temperature::Temperature;
use crate::timer::Timer;

/// Named presets selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Roast,
    SteamBake,
    SousVideThenSear,
}

impl Preset {
    pub const ALL: [Self; 3] = [Self::Roast, Self::SteamBake, Self::SousVideThenSear];
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roast => f.write_str("roast"),
            Self::SteamBake => f.write_str("steam_bake"),
            Self::SousVideThenSear => f.write_str("sous_vide_then_sear"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "roast" => Ok(Self::Roast),
            "steam_bake" => Ok(Self::SteamBake),
            "sous_vide_then_sear" => Ok(Self::SousVideThenSear),
            other => Err(format!("unknown preset `{other}`")),
        }
    }
}

/// Dry roast on top and rear elements, timed from the end of preheat.
///
/// # Errors
///
/// Returns [`ValidationError`] for a zero duration.
pub fn roast(temperature: Temperature, duration_secs: u32) -> Result<CookProgram, ValidationError> {
    let stage = CookStage::builder(temperature)
        .title("Roast")
        .heating_elements(HeatingElements::new(true, false, true)?)
        .timer(Timer::when_preheated(duration_secs)?)
        .build()?;
    CookProgram::new(vec![stage])
}

/// Bake with full steam for the first third, then vent and finish dry.
///
/// # Errors
///
/// Returns [`ValidationError::ZeroTimerDuration`] when `duration_secs` is
/// under three seconds, so one of the two stages would be empty.
pub fn steam_bake(
    temperature: Temperature,
    duration_secs: u32,
) -> Result<CookProgram, ValidationError> {
    let steamed = duration_secs / 3;
    let steam = CookStage::builder(temperature)
        .title("Steam")
        .heating_elements(HeatingElements::new(false, true, true)?)
        .steam(SteamSettings::steam_percentage(100)?)
        .timer(Timer::when_preheated(steamed)?)
        .build()?;
    let finish = CookStage::builder(temperature)
        .title("Finish")
        .heating_elements(HeatingElements::new(false, true, true)?)
        .vent_open(true)
        .timer(Timer::immediate(duration_secs - steamed)?)
        .build()?;
    CookProgram::new(vec![steam, finish])
}

/// Wet-bulb water-bath hold at full humidity, then a short dry sear.
///
/// # Errors
///
/// Returns [`ValidationError::WetBulbTooHot`] when `bath` is above 100 °C,
/// or a timer error for zero durations.
pub fn sous_vide_then_sear(
    bath: Temperature,
    hold_secs: u32,
    sear: Temperature,
    sear_secs: u32,
) -> Result<CookProgram, ValidationError> {
    let hold = CookStage::builder(bath)
        .title("Sous vide")
        .mode(TemperatureMode::Wet)
        .steam(SteamSettings::relative_humidity(100)?)
        .timer(Timer::when_preheated(hold_secs)?)
        .build()?;
    let sear = CookStage::builder(sear)
        .title("Sear")
        .heating_elements(HeatingElements::new(true, false, true)?)
        .timer(Timer::immediate(sear_secs)?)
        .build()?;
    CookProgram::new(vec![hold, sear])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageWarning;

    fn celsius(value: f64) -> Temperature {
        Temperature::from_celsius(value).unwrap()
    }

    #[test]
    fn should_build_roast_with_preheat_timer() {
        let program = roast(celsius(200.0), 3600).unwrap();
        assert_eq!(program.len(), 1);
        assert!(program.requires_preheat());
        assert_eq!(program.stages()[0].heating_elements().active_count(), 2);
    }

    #[test]
    fn should_keep_fahrenheit_input_in_roast() {
        let program = roast(Temperature::from_fahrenheit(400.0).unwrap(), 1800).unwrap();
        assert_eq!(program.stages()[0].temperature().fahrenheit(), 400.0);
    }

    #[test]
    fn should_split_steam_bake_duration_across_two_stages() {
        let program = steam_bake(celsius(230.0), 2700).unwrap();
        let durations: Vec<u32> = program
            .into_iter()
            .filter_map(|stage| stage.timer().map(|t| t.initial()))
            .collect();
        assert_eq!(durations, vec![900, 1800]);
        assert!(program.stages()[1].vent_open());
        assert_eq!(
            program.stages()[0].warnings(),
            vec![StageWarning::DryModeWithSteam]
        );
    }

    #[test]
    fn should_reject_steam_bake_too_short_to_split() {
        assert_eq!(
            steam_bake(celsius(230.0), 2).unwrap_err(),
            ValidationError::ZeroTimerDuration
        );
    }

    #[test]
    fn should_reject_sous_vide_bath_above_boiling() {
        let result = sous_vide_then_sear(celsius(120.0), 3600, celsius(250.0), 300);
        assert!(matches!(result, Err(ValidationError::WetBulbTooHot { .. })));
    }

    #[test]
    fn should_parse_preset_names() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>(), Ok(preset));
        }
        assert_eq!("steam-bake".parse::<Preset>(), Ok(Preset::SteamBake));
    }
}
