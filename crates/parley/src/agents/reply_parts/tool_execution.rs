use futures::future;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::message::ToolCall;
use crate::providers::base::ToolCallRequest;
use crate::tools::ToolRegistry;

pub const EXECUTION_FAILED: &str = "Execution failed";

/// Parse raw argument text into an object, falling back to `{}`
pub fn parse_arguments(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            debug!(arguments = %other, "tool arguments are not an object, using empty arguments");
            Value::Object(Map::new())
        }
        Err(e) => {
            debug!(error = %e, "unparsable tool arguments, using empty arguments");
            Value::Object(Map::new())
        }
    }
}

async fn execute_one(registry: &ToolRegistry, request: &ToolCallRequest) -> ToolCall {
    let arguments = parse_arguments(&request.arguments);
    let result = match registry.dispatch(&request.name, arguments.clone()).await {
        Ok(result) => result,
        Err(e) => {
            warn!(tool = %request.name, id = %request.id, error = %e, "tool call failed");
            json!({ "error": EXECUTION_FAILED })
        }
    };

    ToolCall {
        id: request.id.clone(),
        name: request.name.clone(),
        arguments,
        result,
    }
}

/// Run every requested tool concurrently.
///
/// The output has one entry per request, in request order. A failing call is
/// recorded as `{"error": "Execution failed"}` and never affects its siblings.
#[instrument(skip_all, fields(count = requests.len()))]
pub async fn execute_tool_calls(registry: &ToolRegistry, requests: &[ToolCallRequest]) -> Vec<ToolCall> {
    future::join_all(requests.iter().map(|request| execute_one(registry, request))).await
}
