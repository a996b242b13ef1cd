use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: i32 = 16_000;

/// Request-level settings applied to every completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The model used when a session has not chosen one
    pub model_name: String,
    /// Optional temperature setting (0.0 - 1.0)
    pub temperature: Option<f32>,
    /// Optional maximum tokens to generate
    pub max_tokens: Option<i32>,
}

impl ModelConfig {
    pub fn new(model_name: String) -> Self {
        Self {
            model_name,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temp: Option<f32>) -> Self {
        self.temperature = temp;
        self
    }

    /// Set the max tokens
    pub fn with_max_tokens(mut self, tokens: Option<i32>) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn max_tokens(&self) -> i32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::new("gpt-4o".to_string());
        assert_eq!(config.model_name, "gpt-4o");
        assert_eq!(config.temperature, None);
        assert_eq!(config.max_tokens(), DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_model_config_builders() {
        let config = ModelConfig::new("gpt-4o".to_string())
            .with_temperature(Some(0.2))
            .with_max_tokens(Some(512));
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens(), 512);
    }
}
