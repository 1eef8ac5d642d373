//! Error taxonomy shared across the workspace.
//!
//! Every layer returns [`OvenError`]. Each variant wraps a typed detail struct
//! (or enum) so callers can match on the kind and still read the context
//! (field name, device id, recipe id, stage index) needed to act on it.
//!
//! Only [`ConnectionError`] describes a transport failure, and it is produced
//! *after* the retry policy has been exhausted. Every other kind is
//! non-retryable: the caller must change its input or wait for a different
//! device state.

use crate::device::OvenVersion;
use crate::id::DeviceId;
use crate::steam::SteamMode;
use crate::temperature::TemperatureUnit;

/// Top-level error type for ovenctl operations.
#[derive(Debug, thiserror::Error)]
pub enum OvenError {
    #[error("invalid value: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    RecipeParse(#[from] RecipeParseError),

    #[error(transparent)]
    RecipeNotFound(#[from] RecipeNotFoundError),

    #[error(transparent)]
    IncompatibleRecipe(#[from] IncompatibleRecipeError),

    #[error(transparent)]
    DeviceNotFound(#[from] DeviceNotFoundError),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    CommandRejected(#[from] CommandRejectedError),

    #[error(transparent)]
    StageFailed(#[from] StageFailedError),
}

/// A value or combination of values that the appliance cannot accept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("temperature {value}°{unit} is outside the supported range {min}–{max}°{unit}")]
    TemperatureOutOfRange {
        value: f64,
        unit: TemperatureUnit,
        min: f64,
        max: f64,
    },

    #[error("temperature must be a finite number")]
    NonFiniteTemperature,

    #[error("probe target {celsius}°C is outside the supported range 1–100°C")]
    ProbeOutOfRange { celsius: f64 },

    #[error("wet-bulb temperature {celsius}°C cannot exceed 100°C")]
    WetBulbTooHot { celsius: f64 },

    #[error("all heating elements cannot be active at the same time")]
    AllHeatingElementsActive,

    #[error("{mode} setpoint {magnitude} is outside 0–100")]
    SteamOutOfRange { mode: SteamMode, magnitude: u8 },

    #[error("timer duration must be greater than zero seconds")]
    ZeroTimerDuration,

    #[error("fan speed {0} is outside 0–100")]
    FanSpeedOutOfRange(u8),

    #[error("rack position {0} is outside 1–5")]
    RackPositionOutOfRange(u8),

    #[error("a cook program needs at least one stage")]
    EmptyProgram,

    #[error("device id must not be empty")]
    EmptyDeviceId,
}

/// A recipe source that could not be turned into [`Recipe`](crate::recipe::Recipe)s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "recipe `{}`: field `{field}`: {reason}",
    recipe_label(.recipe_id)
)]
pub struct RecipeParseError {
    /// `None` when the failure is not attributable to a single recipe.
    pub recipe_id: Option<String>,
    /// Dotted path of the offending field, e.g. `stages[1].temperature.value`.
    pub field: String,
    pub reason: String,
}

impl RecipeParseError {
    pub(crate) fn new(
        recipe_id: Option<&str>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            recipe_id: recipe_id.map(str::to_string),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn recipe_label(recipe_id: &Option<String>) -> &str {
    recipe_id.as_deref().unwrap_or("<root>")
}

/// No recipe with this id exists in the loaded library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("recipe `{recipe_id}` not found")]
pub struct RecipeNotFoundError {
    pub recipe_id: String,
}

/// The recipe targets a different oven generation than the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "recipe `{recipe_id}` requires {required} but the device reports {}",
    version_label(.actual)
)]
pub struct IncompatibleRecipeError {
    pub recipe_id: String,
    pub required: OvenVersion,
    pub actual: Option<OvenVersion>,
}

fn version_label(version: &Option<OvenVersion>) -> String {
    version
        .as_ref()
        .map_or_else(|| "no version".to_string(), ToString::to_string)
}

/// No device with this id has been discovered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("device `{device_id}` not found")]
pub struct DeviceNotFoundError {
    pub device_id: DeviceId,
}

/// The operation is not allowed in the session's current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {operation} on device `{device_id}` while {state}")]
pub struct InvalidStateError {
    pub device_id: DeviceId,
    pub operation: &'static str,
    pub state: String,
}

/// The transport kept failing after every retry was spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection failed after {attempts} attempt(s): {reason}")]
pub struct ConnectionError {
    pub device_id: Option<DeviceId>,
    pub attempts: u32,
    pub reason: String,
}

/// Missing or invalid credentials or settings, detected at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("configuration `{key}`: {reason}")]
pub struct ConfigurationError {
    pub key: String,
    pub reason: String,
}

/// The device acknowledged a command with a rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("device `{device_id}` rejected {command}: {reason}")]
pub struct CommandRejectedError {
    pub device_id: DeviceId,
    pub command: &'static str,
    pub reason: String,
}

/// A stage of a running program could not be submitted or was aborted by the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {stage_index} failed on device `{device_id}`: {reason}")]
pub struct StageFailedError {
    pub device_id: DeviceId,
    pub stage_index: usize,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_via_from() {
        let err: OvenError = ValidationError::EmptyProgram.into();
        assert!(matches!(
            err,
            OvenError::Validation(ValidationError::EmptyProgram)
        ));
    }

    #[test]
    fn should_name_recipe_and_field_in_parse_error_message() {
        let err = RecipeParseError::new(Some("bread"), "stages[0].temperature", "missing field");
        assert_eq!(
            err.to_string(),
            "recipe `bread`: field `stages[0].temperature`: missing field"
        );
    }

    #[test]
    fn should_use_root_placeholder_when_recipe_id_unknown() {
        let err = RecipeParseError::new(None, "recipes", "expected a mapping");
        assert!(err.to_string().starts_with("recipe `<root>`"));
    }

    #[test]
    fn should_describe_missing_device_version_in_incompatible_error() {
        let err = IncompatibleRecipeError {
            recipe_id: "bread".to_string(),
            required: OvenVersion::V2,
            actual: None,
        };
        assert_eq!(
            err.to_string(),
            "recipe `bread` requires oven_v2 but the device reports no version"
        );
    }

    #[test]
    fn should_include_stage_index_in_stage_failed_message() {
        let err = StageFailedError {
            device_id: DeviceId::new("oven-1"),
            stage_index: 2,
            reason: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "stage 2 failed on device `oven-1`: timeout"
        );
    }
}
