use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::message::{Message, Role};
use crate::model::ModelConfig;
use crate::tools::Tool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A complete tool invocation requested by the model, not yet executed.
/// `arguments` is the raw argument text as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One message as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl RequestMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// The assistant turn that asked for tools; carries no prose
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

impl From<&Message> for RequestMessage {
    fn from(message: &Message) -> Self {
        Self::text(message.role, message.content.clone())
    }
}

/// A single call to the backend. Built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub tools: Vec<Tool>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<RequestMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            stream: false,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// The non-streaming answer: final text, or tool calls that need no further reduction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub model: String,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn tool_calls(model: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            model: model.into(),
            ..Default::default()
        }
    }
}

/// An incremental piece of a streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    ToolCall {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text(text.into())
    }
}

/// Forward-only and consumed once; a failed item ends the stream
pub type FragmentStream = BoxStream<'static, Result<Fragment, ProviderError>>;

pub enum Completion {
    Full(CompletionResponse),
    Stream(FragmentStream),
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Full(response) => f.debug_tuple("Full").field(response).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Base trait for chat completion backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the model configuration
    fn get_model_config(&self) -> &ModelConfig;

    /// Issue one completion call.
    ///
    /// Returns `Completion::Stream` when `request.stream` is set and the backend
    /// supports it, `Completion::Full` otherwise.
    ///
    /// # Errors
    /// ProviderError for transport and backend failures. Once a stream has been
    /// returned, later failures arrive as an `Err` item inside the stream.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}
