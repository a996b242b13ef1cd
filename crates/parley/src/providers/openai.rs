use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::base::{Completion, CompletionRequest, Fragment, Provider};
use super::errors::ProviderError;
use super::formats::openai::{chunk_to_fragments, create_request, response_to_completion};
use super::sse;
use super::utils::{check_error_body, check_status, emit_debug_trace, handle_response};
use crate::model::ModelConfig;

pub const OPEN_AI_DEFAULT_HOST: &str = "https://api.openai.com/v1";
pub const OPEN_AI_DEFAULT_MODEL: &str = "gpt-4o";
pub const OPEN_AI_DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Settings for any backend that speaks the OpenAI chat completions protocol
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub host: String,
    pub api_key: String,
    pub model: ModelConfig,
    pub timeout: Duration,
}

impl OpenAiProviderConfig {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            model,
            timeout: Duration::from_secs(OPEN_AI_DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, serde::Serialize)]
pub struct OpenAiProvider {
    #[serde(skip)]
    client: Client,
    host: String,
    #[serde(skip)]
    api_key: String,
    model: ModelConfig,
}

impl OpenAiProvider {
    pub fn from_config(config: OpenAiProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            host: config.host,
            api_key: config.api_key,
            model: config.model,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.host.trim_end_matches('/'))
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, ProviderError> {
        let mut request = self.client.post(self.url()).json(payload);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn get_model_config(&self) -> &ModelConfig {
        &self.model
    }

    #[tracing::instrument(
        skip(self, request),
        fields(model = %request.model, stream = request.stream, messages = request.messages.len())
    )]
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let payload = create_request(&self.model, &request);
        let response = self.post(&payload).await?;

        if !request.stream {
            let body = handle_response(&payload, response).await?;
            check_error_body(&body)?;
            let completion = response_to_completion(&body)?;
            emit_debug_trace(&completion.model, &payload, &body, &completion.usage);
            return Ok(Completion::Full(completion));
        }

        let response = check_status(&payload, response).await?;
        let fragments = sse::data_events(response)
            .flat_map(|event| {
                let fragments: Vec<Result<Fragment, ProviderError>> = match event
                    .and_then(|data| serde_json::from_str::<Value>(&data).map_err(Into::into))
                {
                    Ok(chunk) => match check_error_body(&chunk) {
                        Ok(()) => chunk_to_fragments(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    },
                    Err(e) => vec![Err(e)],
                };
                futures::stream::iter(fragments)
            })
            .boxed();

        Ok(Completion::Stream(fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_construction() -> Result<(), ProviderError> {
        let config = OpenAiProviderConfig::new(
            "https://gateway.example.com/v1/",
            "test-key",
            ModelConfig::new(OPEN_AI_DEFAULT_MODEL.to_string()),
        );

        let provider = OpenAiProvider::from_config(config)?;
        assert_eq!(provider.url(), "https://gateway.example.com/v1/chat/completions");
        assert_eq!(provider.get_model_config().model_name, "gpt-4o");

        Ok(())
    }

    #[test]
    fn test_debug_serialization_skips_api_key() {
        let config = OpenAiProviderConfig::new(
            OPEN_AI_DEFAULT_HOST,
            "secret",
            ModelConfig::new(OPEN_AI_DEFAULT_MODEL.to_string()),
        );
        let provider = OpenAiProvider::from_config(config).unwrap();

        let value = serde_json::to_value(&provider).unwrap();
        assert!(value.get("api_key").is_none());
        assert_eq!(value["host"], OPEN_AI_DEFAULT_HOST);
    }
}
