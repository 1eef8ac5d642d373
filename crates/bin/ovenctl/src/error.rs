//! CLI error type and its mapping to process exit codes.

use ovenctl_domain::error::{OvenError, ValidationError};

use crate::config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const DEVICE: i32 = 3;
    pub const COMMAND: i32 = 4;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Oven(#[from] OvenError),

    #[error("{0}")]
    Usage(String),

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ValidationError> for CliError {
    fn from(error: ValidationError) -> Self {
        Self::Oven(error.into())
    }
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::CONFIG,
            Self::Usage(_) => exit_code::COMMAND,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Other(_) => exit_code::GENERAL,
            Self::Oven(error) => match error {
                OvenError::Configuration(_) | OvenError::RecipeParse(_) => exit_code::CONFIG,
                OvenError::DeviceNotFound(_)
                | OvenError::Connection(_)
                | OvenError::IncompatibleRecipe(_) => exit_code::DEVICE,
                OvenError::Validation(_)
                | OvenError::RecipeNotFound(_)
                | OvenError::InvalidState(_)
                | OvenError::CommandRejected(_)
                | OvenError::StageFailed(_) => exit_code::COMMAND,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovenctl_domain::error::{
        ConfigurationError, ConnectionError, DeviceNotFoundError, InvalidStateError,
        RecipeNotFoundError,
    };
    use ovenctl_domain::id::DeviceId;

    #[test]
    fn should_map_configuration_errors_to_config_code() {
        let error = CliError::from(OvenError::from(ConfigurationError {
            key: "connection.token".to_string(),
            reason: "missing".to_string(),
        }));
        assert_eq!(error.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn should_map_device_errors_to_device_code() {
        let missing = CliError::from(OvenError::from(DeviceNotFoundError {
            device_id: DeviceId::new("oven-9"),
        }));
        let offline = CliError::from(OvenError::from(ConnectionError {
            device_id: None,
            attempts: 5,
            reason: "refused".to_string(),
        }));
        assert_eq!(missing.exit_code(), exit_code::DEVICE);
        assert_eq!(offline.exit_code(), exit_code::DEVICE);
    }

    #[test]
    fn should_map_command_errors_to_command_code() {
        let busy = CliError::from(OvenError::from(InvalidStateError {
            device_id: DeviceId::new("oven-1"),
            operation: "start cook",
            state: "cooking".to_string(),
        }));
        let unknown_recipe = CliError::from(OvenError::from(RecipeNotFoundError {
            recipe_id: "bread".to_string(),
        }));
        assert_eq!(busy.exit_code(), exit_code::COMMAND);
        assert_eq!(unknown_recipe.exit_code(), exit_code::COMMAND);
    }

    #[test]
    fn should_use_130_when_interrupted() {
        assert_eq!(CliError::Interrupted.exit_code(), exit_code::INTERRUPTED);
    }
}
