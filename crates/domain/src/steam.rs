//! Steam generator settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How the steam setpoint is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteamMode {
    /// Closed-loop control on cavity relative humidity (wet-bulb cooking).
    #[serde(alias = "relative-humidity")]
    RelativeHumidity,
    /// Open-loop share of steam generator output.
    #[serde(alias = "steam-percentage")]
    SteamPercentage,
}

impl fmt::Display for SteamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelativeHumidity => f.write_str("relative humidity"),
            Self::SteamPercentage => f.write_str("steam percentage"),
        }
    }
}

impl FromStr for SteamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "relative_humidity" | "rh" => Ok(Self::RelativeHumidity),
            "steam_percentage" | "percentage" => Ok(Self::SteamPercentage),
            other => Err(format!("unknown steam mode `{other}`")),
        }
    }
}

/// Steam mode plus a 0–100 setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SteamSettings {
    mode: SteamMode,
    magnitude: u8,
}

impl SteamSettings {
    /// Highest setpoint accepted in either mode.
    pub const MAX_MAGNITUDE: u8 = 100;

    /// # Errors
    ///
    /// Returns [`ValidationError::SteamOutOfRange`] when `magnitude` exceeds 100.
    pub fn new(mode: SteamMode, magnitude: u8) -> Result<Self, ValidationError> {
        if magnitude > Self::MAX_MAGNITUDE {
            return Err(ValidationError::SteamOutOfRange { mode, magnitude });
        }
        Ok(Self { mode, magnitude })
    }

    /// # Errors
    ///
    /// See [`SteamSettings::new`].
    pub fn relative_humidity(percent: u8) -> Result<Self, ValidationError> {
        Self::new(SteamMode::RelativeHumidity, percent)
    }

    /// # Errors
    ///
    /// See [`SteamSettings::new`].
    pub fn steam_percentage(percent: u8) -> Result<Self, ValidationError> {
        Self::new(SteamMode::SteamPercentage, percent)
    }

    #[must_use]
    pub fn mode(&self) -> SteamMode {
        self.mode
    }

    #[must_use]
    pub fn magnitude(&self) -> u8 {
        self.magnitude
    }
}

impl fmt::Display for SteamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% {}", self.magnitude, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_full_range_in_both_modes() {
        for magnitude in [0, 50, 100] {
            assert!(SteamSettings::relative_humidity(magnitude).is_ok());
            assert!(SteamSettings::steam_percentage(magnitude).is_ok());
        }
    }

    #[test]
    fn should_reject_magnitude_above_hundred() {
        assert_eq!(
            SteamSettings::steam_percentage(101),
            Err(ValidationError::SteamOutOfRange {
                mode: SteamMode::SteamPercentage,
                magnitude: 101
            })
        );
    }

    #[test]
    fn should_display_percentage_and_mode() {
        let steam = SteamSettings::relative_humidity(50).unwrap();
        assert_eq!(steam.to_string(), "50% relative humidity");
    }

    #[test]
    fn should_parse_mode_with_dashes_or_underscores() {
        assert_eq!(
            "relative-humidity".parse::<SteamMode>(),
            Ok(SteamMode::RelativeHumidity)
        );
        assert_eq!(
            "steam_percentage".parse::<SteamMode>(),
            Ok(SteamMode::SteamPercentage)
        );
    }

    #[test]
    fn should_deserialize_mode_from_snake_case() {
        let mode: SteamMode = serde_json::from_str("\"relative_humidity\"").unwrap();
        assert_eq!(mode, SteamMode::RelativeHumidity);
    }
}
