//! Configuration management
//!
//! Settings come from an optional TOML file plus `SWITCHBOARD__`
//! environment overrides. Loading is lenient, validation is strict:
//! `validate` runs once at startup and fails fast on anything the
//! relay cannot run without.

use crate::domain::tenant::TenantVoiceProfile;
use crate::domain::tool::ToolDefinition;
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub speech: SpeechConfig,
    pub provider: ProviderConfig,
    pub auth: AuthConfig,
    pub tools: Vec<ToolDefinition>,
    pub tenants: Vec<TenantVoiceProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Watchdog window in seconds; any socket frame resets it
    pub idle_timeout_secs: u64,
    /// Agent prompt used until a tenant profile refines it
    pub default_instructions: String,
    pub default_voice: String,
    pub temperature: f32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 90,
            default_instructions:
                "You are a friendly phone assistant answering a call for a business. \
                 Keep replies short and conversational."
                    .to_string(),
            default_voice: "alloy".to_string(),
            temperature: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Realtime speech websocket endpoint
    pub url: String,
    pub api_key: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub base_url: String,
    /// Caller id for outbound dials
    pub from_number: Option<String>,
    /// Voice webhook handed to the carrier on originate
    pub voice_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            base_url: "https://api.twilio.com/2010-04-01".to_string(),
            from_number: None,
            voice_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for dashboard websocket tokens. Empty disables
    /// verification; every dashboard client then stays anonymous.
    pub token_secret: String,
}

impl Config {
    /// Load from the given TOML file (optional) with environment
    /// overrides applied on top, e.g. `SWITCHBOARD__SERVER__PORT=9000`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let built = config::Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SWITCHBOARD")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(built.try_deserialize()?)
    }

    /// Startup validation. Required settings fail fast here; optional
    /// integrations degrade at construction time instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.speech.url.is_empty() {
            return Err(ConfigError::Invalid("speech.url is required".to_string()));
        }
        if self.speech.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "speech.api_key is required (set SWITCHBOARD__SPEECH__API_KEY)".to_string(),
            ));
        }
        if self.relay.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "relay.idle_timeout_secs must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.relay.temperature) {
            return Err(ConfigError::Invalid(
                "relay.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.provider.account_sid.is_some() != self.provider.auth_token.is_some() {
            return Err(ConfigError::Invalid(
                "provider.account_sid and provider.auth_token must be set together".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "every tool needs a non-empty name".to_string(),
                ));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate tool name: {}",
                    tool.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::ToolBackend;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.speech.api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.relay.idle_timeout_secs, 90);
        assert!(config.tools.is_empty());
        assert!(config.tenants.is_empty());
    }

    #[test]
    fn test_validate_requires_speech_api_key() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("speech.api_key"));

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_idle_timeout() {
        let mut config = valid_config();
        config.relay.idle_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_partial_provider_credentials() {
        let mut config = valid_config();
        config.provider.account_sid = Some("AC123".to_string());
        assert!(config.validate().is_err());

        config.provider.auth_token = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_tool_names() {
        let mut config = valid_config();
        for _ in 0..2 {
            config.tools.push(ToolDefinition {
                name: "check_availability".to_string(),
                description: String::new(),
                parameters: serde_json::json!({ "type": "object" }),
                backend: ToolBackend::Builtin,
                timeout_secs: None,
            });
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn test_parse_full_file() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9090

            [relay]
            idle_timeout_secs = 30

            [speech]
            api_key = "sk-live"

            [provider]
            account_sid = "AC123"
            auth_token = "token"
            from_number = "+15550100"

            [auth]
            token_secret = "hub-secret"

            [[tools]]
            name = "check_availability"
            description = "Check free tables for a date"
            parameters = { type = "object", properties = { date = { type = "string" } } }
            backend = { kind = "webhook", url = "https://hooks.example.com/avail" }
            timeout_secs = 5

            [[tenants]]
            tenant_id = "t1"
            name = "Trattoria Uno"
            instructions = "You answer for Trattoria Uno."
            voice = "verse"
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.relay.idle_timeout_secs, 30);
        // Unset relay keys keep their defaults.
        assert_eq!(config.relay.default_voice, "alloy");
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].timeout_secs, Some(5));
        assert!(matches!(
            config.tools[0].backend,
            ToolBackend::Webhook { .. }
        ));
        assert_eq!(config.tenants.len(), 1);
        assert_eq!(config.tenants[0].voice.as_deref(), Some("verse"));
        assert!(config.validate().is_ok());
    }
}
