use serde_json::{json, Map, Value};

use crate::model::ModelConfig;
use crate::providers::base::{
    CompletionRequest, CompletionResponse, Fragment, RequestMessage, ToolCallRequest,
};
use crate::providers::errors::ProviderError;
use crate::providers::utils::{get_model, get_usage};
use crate::tools::Tool;

/// Convert internal messages to OpenAI's chat message specification
pub fn format_messages(messages: &[RequestMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let mut converted = json!({
                "role": message.role.as_str(),
                "content": message.content,
            });
            if !message.tool_calls.is_empty() {
                converted["tool_calls"] = json!(message
                    .tool_calls
                    .iter()
                    .map(|call| json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    }))
                    .collect::<Vec<_>>());
            }
            if let Some(id) = &message.tool_call_id {
                converted["tool_call_id"] = json!(id);
            }
            converted
        })
        .collect()
}

/// Convert internal tool definitions to OpenAI's function tool specification
pub fn format_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

pub fn create_request(model_config: &ModelConfig, request: &CompletionRequest) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(request.model));
    payload.insert(
        "messages".to_string(),
        json!(format_messages(&request.messages)),
    );
    if !request.tools.is_empty() {
        payload.insert("tools".to_string(), json!(format_tools(&request.tools)));
        payload.insert("tool_choice".to_string(), json!("auto"));
    }
    payload.insert("max_tokens".to_string(), json!(model_config.max_tokens()));
    if let Some(temperature) = model_config.temperature {
        payload.insert("temperature".to_string(), json!(temperature));
    }
    payload.insert("stream".to_string(), json!(request.stream));
    Value::Object(payload)
}

/// Read a non-streaming chat completion body
pub fn response_to_completion(response: &Value) -> Result<CompletionResponse, ProviderError> {
    let choices = response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::ResponseParseError("response has no choices".into()))?;

    let mut completion = CompletionResponse {
        model: get_model(response),
        usage: get_usage(response),
        ..Default::default()
    };

    let Some(message) = choices.first().and_then(|choice| choice.get("message")) else {
        return Ok(completion);
    };

    completion.text = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (position, call) in tool_calls.iter().enumerate() {
            let function = call.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let arguments = function
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", position));
            completion
                .tool_calls
                .push(ToolCallRequest::new(id, name, arguments));
        }
    }

    Ok(completion)
}

/// Read the fragments carried by one streamed chunk, in order
pub fn chunk_to_fragments(chunk: &Value) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let Some(delta) = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
    else {
        return fragments;
    };

    if let Some(content) = delta.get("content").and_then(Value::as_str) {
        if !content.is_empty() {
            fragments.push(Fragment::text(content));
        }
    }

    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for (position, call) in tool_calls.iter().enumerate() {
            let index = call
                .get("index")
                .and_then(Value::as_u64)
                .map(|i| i as usize)
                .unwrap_or(position);
            let function = call.get("function");
            let text_field = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);
            fragments.push(Fragment::ToolCall {
                index,
                id: text_field(call.get("id")),
                name: text_field(function.and_then(|f| f.get("name"))),
                arguments: text_field(function.and_then(|f| f.get("arguments"))),
            });
        }
    }

    fragments
}
