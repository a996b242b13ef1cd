use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use parley::agents::{AgentConfig, DEFAULT_FOLLOW_UP_WINDOW, DEFAULT_HISTORY_WINDOW};
use parley::model::{ModelConfig, DEFAULT_MAX_TOKENS};
use parley::providers::openai::{
    OpenAiProviderConfig, OPEN_AI_DEFAULT_HOST, OPEN_AI_DEFAULT_MODEL, OPEN_AI_DEFAULT_TIMEOUT_SECS,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI SEO assistant.";

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress {
                host: self.host.clone(),
                port: self.port,
            })
    }
}

/// Any backend speaking the OpenAI chat completions protocol
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_host")]
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig::new(
            self.host,
            self.api_key,
            ModelConfig::new(self.model)
                .with_temperature(self.temperature)
                .with_max_tokens(self.max_tokens),
        )
        .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_follow_up_window")]
    pub follow_up_window: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history_window: default_history_window(),
            follow_up_window: default_follow_up_window(),
        }
    }
}

impl AgentSettings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            history_window: self.history_window,
            follow_up_window: self.follow_up_window,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingSettings {
    /// Also write JSON logs to a daily rolling file in this directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_provider_host())?
            .set_default("provider.model", default_model())?
            .set_default("provider.max_tokens", i64::from(DEFAULT_MAX_TOKENS))?
            .set_default("provider.timeout_secs", default_timeout_secs())?
            .set_default("agent.system_prompt", default_system_prompt())?
            .set_default("agent.history_window", default_history_window() as u64)?
            .set_default("agent.follow_up_window", default_follow_up_window() as u64)?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `api_key`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .split('`')
                        .next()
                        .unwrap_or_default();
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_provider_host() -> String {
    OPEN_AI_DEFAULT_HOST.to_string()
}

fn default_model() -> String {
    OPEN_AI_DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    OPEN_AI_DEFAULT_TIMEOUT_SECS
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_follow_up_window() -> usize {
    DEFAULT_FOLLOW_UP_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PARLEY_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("PARLEY_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.provider.host, "https://api.openai.com/v1");
        assert_eq!(settings.provider.api_key, "test-key");
        assert_eq!(settings.provider.model, "gpt-4o");
        assert_eq!(settings.provider.max_tokens, Some(16_000));
        assert_eq!(settings.provider.temperature, None);
        assert_eq!(settings.provider.timeout_secs, 600);
        assert_eq!(settings.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(settings.agent.history_window, 5);
        assert_eq!(settings.agent.follow_up_window, 3);
        assert_eq!(settings.logging.dir, None);

        env::remove_var("PARLEY_PROVIDER__API_KEY");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("PARLEY_SERVER__PORT", "8080");
        env::set_var("PARLEY_PROVIDER__API_KEY", "test-key");
        env::set_var("PARLEY_PROVIDER__HOST", "https://gateway.example.com/v1");
        env::set_var("PARLEY_PROVIDER__MODEL", "gemini-2.5-flash");
        env::set_var("PARLEY_PROVIDER__TEMPERATURE", "0.2");
        env::set_var("PARLEY_AGENT__HISTORY_WINDOW", "10");
        env::set_var("PARLEY_LOGGING__DIR", "/tmp/parley-logs");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.provider.host, "https://gateway.example.com/v1");
        assert_eq!(settings.provider.model, "gemini-2.5-flash");
        assert_eq!(settings.provider.temperature, Some(0.2));
        assert_eq!(settings.agent.history_window, 10);
        assert_eq!(settings.logging.dir, Some(PathBuf::from("/tmp/parley-logs")));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key_names_env_var() {
        clean_env();
        let err = Settings::new().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "PARLEY_PROVIDER__API_KEY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_into_config_conversion() {
        let settings = ProviderSettings {
            host: "https://api.openai.com/v1".to_string(),
            api_key: "test-key".to_string(),
            model: "gpt-4o".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(1000),
            timeout_secs: 30,
        };

        let config = settings.into_config();
        assert_eq!(config.host, "https://api.openai.com/v1");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model.model_name, "gpt-4o");
        assert_eq!(config.model.temperature, Some(0.7));
        assert_eq!(config.model.max_tokens, Some(1000));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings::default();
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(bad.socket_addr().is_err());
    }
}
