//! WebSocket channel configuration.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::WebSocketError;

/// Configuration for the cloud WebSocket channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Endpoint without query parameters.
    pub ws_url: String,
    /// Personal access token; required to connect.
    pub token: Option<String>,
    /// Accessory types announced to the server, e.g. `APO`.
    pub supported_accessories: Vec<String>,
    /// Handshake timeout in seconds.
    pub connect_timeout_secs: f64,
    /// Client platform announced to the server.
    pub platform: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://devices.anovaculinary.io".to_string(),
            token: None,
            supported_accessories: vec!["APO".to_string()],
            connect_timeout_secs: 30.0,
            platform: "android".to_string(),
        }
    }
}

impl WebSocketConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs).unwrap_or(Duration::from_secs(30))
    }

    /// Full connection URL carrying the token, accessories and platform.
    ///
    /// # Errors
    ///
    /// - [`WebSocketError::MissingToken`] when no token is set
    /// - [`WebSocketError::Url`] when `ws_url` does not parse
    pub fn endpoint(&self) -> Result<Url, WebSocketError> {
        let token = self
            .token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or(WebSocketError::MissingToken)?;
        let mut url = Url::parse(&self.ws_url).map_err(WebSocketError::Url)?;
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("supportedAccessories", &self.supported_accessories.join(","))
            .append_pair("platform", &self.platform);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = WebSocketConfig::default();
        assert_eq!(config.ws_url, "wss://devices.anovaculinary.io");
        assert_eq!(config.supported_accessories, vec!["APO"]);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert!(config.token.is_none());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            ws_url = "wss://oven.example.com/ws"
            token = "secret"
            supported_accessories = ["APO", "APC"]
            connect_timeout_secs = 5.5
        "#;
        let config: WebSocketConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.ws_url, "wss://oven.example.com/ws");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.supported_accessories.len(), 2);
        assert_eq!(config.connect_timeout(), Duration::from_millis(5500));
        assert_eq!(config.platform, "android");
    }

    #[test]
    fn should_build_endpoint_with_query_parameters() {
        let config = WebSocketConfig {
            token: Some("abc".to_string()),
            ..WebSocketConfig::default()
        };
        let url = config.endpoint().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://devices.anovaculinary.io/?token=abc&supportedAccessories=APO&platform=android"
        );
    }

    #[test]
    fn should_return_missing_token_when_token_blank() {
        let config = WebSocketConfig {
            token: Some("  ".to_string()),
            ..WebSocketConfig::default()
        };
        assert!(matches!(config.endpoint(), Err(WebSocketError::MissingToken)));
    }

    #[test]
    fn should_fall_back_when_timeout_negative() {
        let config = WebSocketConfig {
            connect_timeout_secs: -1.0,
            ..WebSocketConfig::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }
}
