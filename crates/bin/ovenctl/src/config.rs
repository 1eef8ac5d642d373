//! Configuration loading: a TOML file with environment variable overrides.
//!
//! Looks for `ovenctl.toml` in the working directory unless `--config` names
//! a file. Every field has a sensible default so the file is optional.
//! Environment variables take precedence over file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use ovenctl_adapter_websocket::WebSocketConfig;
use ovenctl_app::retry::RetryPolicy;
use ovenctl_app::session::SessionConfig;
use ovenctl_domain::error::ConfigurationError;

const DEFAULT_PATH: &str = "ovenctl.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    pub recipes: RecipesConfig,
}

/// Which [`CommandChannel`](ovenctl_app::ports::CommandChannel) to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The vendor cloud.
    #[default]
    Websocket,
    /// Simulated ovens, for demos.
    Virtual,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::Websocket),
            "virtual" => Ok(Self::Virtual),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

/// Connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub backend: Backend,
    pub ws_url: String,
    pub token: Option<String>,
    /// Accessory types to discover; empty discovers everything.
    pub supported_accessories: Vec<String>,
    pub connect_timeout_secs: f64,
    /// How long a device may take to acknowledge a command.
    pub ack_timeout_secs: f64,
    /// Default discovery window for commands that need a device.
    pub discovery_timeout_secs: f64,
    /// Speed-up of the virtual backend's simulated preheat and timers.
    pub virtual_time_scale: f64,
}

/// Backoff for transient transport failures.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax). Unset uses the `-v` level.
    pub filter: Option<String>,
}

/// Recipe library location.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecipesConfig {
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path` (or `ovenctl.toml` if present), apply
    /// environment-variable overrides, then the command-line `backend`, and
    /// validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, if an explicitly named
    /// file cannot be read, or if validation fails.
    pub fn load(path: Option<&Path>, backend: Option<Backend>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path, true)?,
            None => Self::from_file(Path::new(DEFAULT_PATH), false)?,
        };
        config.apply_env_overrides()?;
        if let Some(backend) = backend {
            config.connection.backend = backend;
        }
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("OVENCTL_TOKEN") {
            self.connection.token = Some(val);
        }
        if let Some(val) = var("OVENCTL_WS_URL") {
            self.connection.ws_url = val;
        }
        if let Some(val) = var("OVENCTL_BACKEND") {
            self.connection.backend = val.parse().map_err(|reason| ConfigurationError {
                key: "OVENCTL_BACKEND".to_string(),
                reason,
            })?;
        }
        if let Some(val) = var("OVENCTL_RECIPES") {
            self.recipes.file = Some(PathBuf::from(val));
        }
        if let Some(val) = var("OVENCTL_LOG") {
            self.logging.filter = Some(val);
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = Some(val);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| {
            Err(ConfigError::Invalid(ConfigurationError {
                key: key.to_string(),
                reason: reason.to_string(),
            }))
        };
        let connection = &self.connection;
        if connection.backend == Backend::Websocket {
            if connection
                .token
                .as_deref()
                .is_none_or(|token| token.trim().is_empty())
            {
                return invalid(
                    "connection.token",
                    "a token is required for the websocket backend (set OVENCTL_TOKEN)",
                );
            }
            if !connection.ws_url.starts_with("ws://") && !connection.ws_url.starts_with("wss://")
            {
                return invalid("connection.ws_url", "must start with ws:// or wss://");
            }
        }
        for (key, secs) in [
            ("connection.connect_timeout_secs", connection.connect_timeout_secs),
            ("connection.ack_timeout_secs", connection.ack_timeout_secs),
            ("connection.discovery_timeout_secs", connection.discovery_timeout_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0) {
                return invalid(key, "must be a positive number of seconds");
            }
        }
        if !(connection.virtual_time_scale.is_finite() && connection.virtual_time_scale >= 0.0) {
            return invalid("connection.virtual_time_scale", "must not be negative");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "must be at least 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return invalid("retry.base_delay_ms", "must not exceed retry.max_delay_ms");
        }
        Ok(())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            max_attempts: self.retry.max_attempts,
        }
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ack_timeout: secs(self.connection.ack_timeout_secs),
            retry: self.retry_policy(),
        }
    }

    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            ws_url: self.connection.ws_url.clone(),
            token: self.connection.token.clone(),
            supported_accessories: self.connection.supported_accessories.clone(),
            connect_timeout_secs: self.connection.connect_timeout_secs,
            ..WebSocketConfig::default()
        }
    }

    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        secs(self.connection.discovery_timeout_secs)
    }
}

/// Validated positive seconds; falls back to one second.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::from_secs(1))
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let websocket = WebSocketConfig::default();
        Self {
            backend: Backend::default(),
            ws_url: websocket.ws_url,
            token: None,
            supported_accessories: websocket.supported_accessories,
            connect_timeout_secs: websocket.connect_timeout_secs,
            ack_timeout_secs: 10.0,
            discovery_timeout_secs: 5.0,
            virtual_time_scale: 0.01,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX),
            max_delay_ms: u64::try_from(policy.max_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}
