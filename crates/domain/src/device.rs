//! Device: a discovered appliance and its last reported status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Oven hardware generation. Recipes may be restricted to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OvenVersion {
    #[serde(rename = "oven_v1", alias = "v1")]
    V1,
    #[serde(rename = "oven_v2", alias = "v2")]
    V2,
}

impl fmt::Display for OvenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("oven_v1"),
            Self::V2 => f.write_str("oven_v2"),
        }
    }
}

impl FromStr for OvenVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oven_v1" | "v1" => Ok(Self::V1),
            "oven_v2" | "v2" => Ok(Self::V2),
            other => Err(format!("unknown oven version `{other}`")),
        }
    }
}

/// Operating state last reported by the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Idle,
    Preheating,
    Cooking,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Preheating => "preheating",
            Self::Cooking => "cooking",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A discovered oven.
///
/// Owned by the service layer. Discovery replaces the record; state
/// notifications refresh `state` and `current_temperature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// Accessory type tag announced by the appliance, e.g. `APO`.
    pub device_type: String,
    pub oven_version: Option<OvenVersion>,
    pub paired_at: Option<Timestamp>,
    pub state: DeviceState,
    /// Last cavity temperature in °C.
    pub current_temperature: Option<f64>,
}

impl Device {
    /// Accessory tag assumed when the appliance does not announce one.
    pub const DEFAULT_TYPE: &'static str = "APO";

    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceId`] when `id` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        Ok(())
    }

    /// Whether the device's accessory tag is in `accessories`.
    ///
    /// An empty filter matches every device.
    #[must_use]
    pub fn matches_accessories(&self, accessories: &[String]) -> bool {
        accessories.is_empty()
            || accessories
                .iter()
                .any(|accessory| accessory.eq_ignore_ascii_case(&self.device_type))
    }
}

#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    device_type: Option<String>,
    oven_version: Option<OvenVersion>,
    paired_at: Option<Timestamp>,
    state: DeviceState,
    current_temperature: Option<f64>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    #[must_use]
    pub fn oven_version(mut self, version: OvenVersion) -> Self {
        self.oven_version = Some(version);
        self
    }

    #[must_use]
    pub fn paired_at(mut self, paired_at: Timestamp) -> Self {
        self.paired_at = Some(paired_at);
        self
    }

    #[must_use]
    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn current_temperature(mut self, celsius: f64) -> Self {
        self.current_temperature = Some(celsius);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// A missing name falls back to the id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceId`] if `id` is missing or blank.
    pub fn build(self) -> Result<Device, ValidationError> {
        let id = self.id.unwrap_or_else(|| DeviceId::new(""));
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.to_string());
        let device = Device {
            id,
            name,
            device_type: self
                .device_type
                .unwrap_or_else(|| Device::DEFAULT_TYPE.to_string()),
            oven_version: self.oven_version,
            paired_at: self.paired_at,
            state: self.state,
            current_temperature: self.current_temperature,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_device_with_defaults() {
        let device = Device::builder().id("oven-1").build().unwrap();
        assert_eq!(device.name, "oven-1");
        assert_eq!(device.device_type, Device::DEFAULT_TYPE);
        assert_eq!(device.state, DeviceState::Unknown);
        assert!(device.oven_version.is_none());
    }

    #[test]
    fn should_return_validation_error_when_id_missing() {
        assert_eq!(
            Device::builder().name("Kitchen").build(),
            Err(ValidationError::EmptyDeviceId)
        );
    }

    #[test]
    fn should_parse_oven_version_short_and_long_forms() {
        assert_eq!("v2".parse::<OvenVersion>(), Ok(OvenVersion::V2));
        assert_eq!("OVEN_V1".parse::<OvenVersion>(), Ok(OvenVersion::V1));
        assert!("v3".parse::<OvenVersion>().is_err());
    }

    #[test]
    fn should_serialize_oven_version_with_prefix() {
        assert_eq!(
            serde_json::to_string(&OvenVersion::V2).unwrap(),
            "\"oven_v2\""
        );
        let parsed: OvenVersion = serde_json::from_str("\"v1\"").unwrap();
        assert_eq!(parsed, OvenVersion::V1);
    }

    #[test]
    fn should_map_unrecognised_state_to_unknown() {
        let state: DeviceState = serde_json::from_str("\"descaling\"").unwrap();
        assert_eq!(state, DeviceState::Unknown);
    }

    #[test]
    fn should_match_accessory_filter_case_insensitively() {
        let device = Device::builder().id("oven-1").device_type("apo").build().unwrap();
        assert!(device.matches_accessories(&["APO".to_string()]));
        assert!(!device.matches_accessories(&["APC".to_string()]));
        assert!(device.matches_accessories(&[]));
    }
}
