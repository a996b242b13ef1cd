use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex};

use super::base::{Completion, CompletionRequest, CompletionResponse, Fragment, Provider, Usage};
use super::errors::ProviderError;
use crate::model::ModelConfig;

/// One scripted reply of the mock provider
#[derive(Debug)]
pub enum MockResponse {
    Full(CompletionResponse),
    /// Fragments followed by an optional mid-stream failure
    Stream(Vec<Fragment>, Option<ProviderError>),
    Error(ProviderError),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        MockResponse::Full(CompletionResponse::text("mock", text))
    }

    pub fn stream(fragments: Vec<Fragment>) -> Self {
        MockResponse::Stream(fragments, None)
    }
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    model_config: ModelConfig,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            model_config: ModelConfig::new("mock".to_string()),
        }
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn get_model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| (!responses.is_empty()).then(|| responses.remove(0)));

        match next {
            // Return empty response if no more pre-configured responses
            None => Ok(Completion::Full(CompletionResponse {
                text: Some(String::new()),
                model: "mock".to_string(),
                usage: Usage::new(Some(1), Some(1), Some(2)),
                ..Default::default()
            })),
            Some(MockResponse::Full(response)) => Ok(Completion::Full(response)),
            Some(MockResponse::Error(error)) => Err(error),
            Some(MockResponse::Stream(fragments, failure)) => {
                let items = fragments
                    .into_iter()
                    .map(Ok)
                    .chain(failure.map(Err))
                    .collect::<Vec<_>>();
                Ok(Completion::Stream(futures::stream::iter(items).boxed()))
            }
        }
    }
}
