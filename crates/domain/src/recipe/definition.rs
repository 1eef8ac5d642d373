//! Pre-validation stage definitions as they appear in a recipe file.
//!
//! These mirror [`CookStage`](crate::stage::CookStage) field for field but
//! hold raw magnitudes. Range checks happen when the recipe is compiled, so a
//! library can be loaded and listed even if one of its recipes is out of range.

use serde::{Deserialize, Serialize};

use crate::stage::TemperatureMode;
use crate::steam::SteamMode;
use crate::temperature::TemperatureUnit;
use crate::timer::TimerStartType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureDefinition {
    pub value: f64,
    #[serde(default, alias = "temperature_unit")]
    pub unit: TemperatureUnit,
    #[serde(default)]
    pub mode: TemperatureMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeatingElementsDefinition {
    #[serde(default)]
    pub top: bool,
    #[serde(default)]
    pub bottom: bool,
    #[serde(default)]
    pub rear: bool,
}

/// Steam mode and setpoint of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SteamDefinition {
    pub mode: SteamMode,
    pub magnitude: u8,
}

/// Steam as written in the file: either `{ mode, magnitude }` or a per-mode
/// shorthand such as `{ relative_humidity: 50 }`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSteam {
    mode: Option<SteamMode>,
    magnitude: Option<u8>,
    relative_humidity: Option<u8>,
    steam_percentage: Option<u8>,
}

impl RawSteam {
    /// When the shorthand names both modes, the one regulated by
    /// `temperature_mode` wins: relative humidity for wet-bulb, steam
    /// percentage for dry-bulb. An empty mapping means no steam.
    fn resolve(self, temperature_mode: TemperatureMode) -> Result<Option<SteamDefinition>, String> {
        let resolved = match (self.mode, self.magnitude) {
            (Some(mode), Some(magnitude)) => Some((mode, magnitude)),
            (Some(_), None) => return Err("steam `mode` needs a `magnitude`".to_string()),
            (None, Some(_)) => return Err("steam `magnitude` needs a `mode`".to_string()),
            (None, None) => match (self.relative_humidity, self.steam_percentage, temperature_mode) {
                (Some(rh), Some(_), TemperatureMode::Wet) | (Some(rh), None, _) => {
                    Some((SteamMode::RelativeHumidity, rh))
                }
                (_, Some(pct), _) => Some((SteamMode::SteamPercentage, pct)),
                (None, None, _) => None,
            },
        };
        Ok(resolved.map(|(mode, magnitude)| SteamDefinition { mode, magnitude }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDefinition {
    #[serde(alias = "initial")]
    pub seconds: u32,
    #[serde(default)]
    pub start_type: TimerStartType,
}

/// One stage of a recipe, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStage")]
pub struct StageDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub temperature: TemperatureDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heating_elements: Option<HeatingElementsDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steam: Option<SteamDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed: Option<u8>,
    pub vent_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack_position: Option<u8>,
}

#[derive(Deserialize)]
struct RawStage {
    #[serde(default, alias = "name")]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    temperature: TemperatureDefinition,
    #[serde(default)]
    heating_elements: Option<HeatingElementsDefinition>,
    #[serde(default)]
    steam: Option<RawSteam>,
    #[serde(default)]
    timer: Option<TimerDefinition>,
    #[serde(default)]
    fan_speed: Option<u8>,
    #[serde(default)]
    vent_open: bool,
    #[serde(default)]
    rack_position: Option<u8>,
}

impl TryFrom<RawStage> for StageDefinition {
    type Error = String;

    fn try_from(raw: RawStage) -> Result<Self, Self::Error> {
        let steam = match raw.steam {
            Some(steam) => steam.resolve(raw.temperature.mode)?,
            None => None,
        };
        Ok(Self {
            title: raw.title,
            description: raw.description,
            temperature: raw.temperature,
            heating_elements: raw.heating_elements,
            steam,
            timer: raw.timer,
            fan_speed: raw.fan_speed,
            vent_open: raw.vent_open,
            rack_position: raw.rack_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(yaml: &str) -> Result<StageDefinition, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    #[test]
    fn should_default_unit_and_mode_when_omitted() {
        let stage = stage("temperature: { value: 180 }").unwrap();
        assert_eq!(stage.temperature.unit, TemperatureUnit::Celsius);
        assert_eq!(stage.temperature.mode, TemperatureMode::Dry);
        assert!(stage.heating_elements.is_none());
    }

    #[test]
    fn should_accept_name_and_temperature_unit_aliases() {
        let stage =
            stage("name: Sear\ntemperature: { value: 400, temperature_unit: F, mode: DRY }").unwrap();
        assert_eq!(stage.title.as_deref(), Some("Sear"));
        assert_eq!(stage.temperature.unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn should_parse_explicit_steam() {
        let stage = stage(
            "temperature: { value: 60, mode: WET }\nsteam: { mode: relative_humidity, magnitude: 80 }",
        )
        .unwrap();
        assert_eq!(
            stage.steam,
            Some(SteamDefinition {
                mode: SteamMode::RelativeHumidity,
                magnitude: 80
            })
        );
    }

    #[test]
    fn should_pick_shorthand_steam_by_temperature_mode_when_both_given() {
        let wet = stage(
            "temperature: { value: 60, mode: WET }\nsteam: { relative_humidity: 50, steam_percentage: 30 }",
        )
        .unwrap();
        let dry = stage(
            "temperature: { value: 200, mode: DRY }\nsteam: { relative_humidity: 50, steam_percentage: 30 }",
        )
        .unwrap();
        assert_eq!(wet.steam.map(|s| s.mode), Some(SteamMode::RelativeHumidity));
        assert_eq!(dry.steam.map(|s| (s.mode, s.magnitude)), Some((SteamMode::SteamPercentage, 30)));
    }

    #[test]
    fn should_resolve_empty_steam_mapping_to_no_steam() {
        let stage = stage("temperature: { value: 60 }\nsteam: {}").unwrap();
        assert!(stage.steam.is_none());
    }

    #[test]
    fn should_fail_when_steam_mode_has_no_magnitude() {
        let message = stage("temperature: { value: 60 }\nsteam: { mode: steam_percentage }")
            .unwrap_err()
            .to_string();
        assert!(message.contains("magnitude"), "{message}");
    }

    #[test]
    fn should_fail_when_steam_has_unknown_key() {
        assert!(stage("temperature: { value: 60 }\nsteam: { humidity: 10 }").is_err());
    }

    #[test]
    fn should_fail_when_temperature_missing() {
        let message = stage("fan_speed: 50").unwrap_err().to_string();
        assert!(message.contains("temperature"), "{message}");
    }
}
