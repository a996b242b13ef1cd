use tracing::debug;

use super::completion::collect_completion;
use crate::message::{Message, ToolCall};
use crate::providers::base::{CompletionRequest, Provider, RequestMessage, ToolCallRequest};
use crate::providers::errors::ProviderError;

/// Returned when the follow-up call produces no usable text
pub const SYNTHESIS_FALLBACK: &str = "Done.";

/// Everything needed to ask the model for a final answer after tools have run
#[derive(Debug, Clone)]
pub struct FollowUp<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    /// Messages that preceded the current user message
    pub history: &'a [Message],
    pub user_message: &'a str,
    pub requested: &'a [ToolCallRequest],
    pub executed: &'a [ToolCall],
}

/// Build the follow-up request.
///
/// Order is fixed: system prompt, history, the user message, one assistant
/// message announcing the tool calls, then one tool message per executed call.
/// No tools are offered and streaming is off.
pub fn build_follow_up_request(follow_up: &FollowUp<'_>) -> CompletionRequest {
    let mut messages = Vec::with_capacity(follow_up.history.len() + follow_up.executed.len() + 3);
    messages.push(RequestMessage::system(follow_up.system_prompt));
    messages.extend(follow_up.history.iter().map(RequestMessage::from));
    messages.push(RequestMessage::user(follow_up.user_message));
    messages.push(RequestMessage::assistant_tool_calls(follow_up.requested.to_vec()));
    messages.extend(
        follow_up
            .executed
            .iter()
            .map(|call| RequestMessage::tool_result(call.id.clone(), call.result.to_string())),
    );

    CompletionRequest::new(follow_up.model, messages)
}

/// Ask the model to turn tool results into a final answer
pub async fn synthesize(
    provider: &dyn Provider,
    follow_up: FollowUp<'_>,
) -> Result<String, ProviderError> {
    let request = build_follow_up_request(&follow_up);
    debug!(messages = request.messages.len(), "requesting follow-up synthesis");

    let completion = provider.complete(request).await?;
    let text = collect_completion(completion).await?.text;
    if text.is_empty() {
        Ok(SYNTHESIS_FALLBACK.to_string())
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::providers::mock::{MockProvider, MockResponse};
    use serde_json::json;

    fn executed() -> Vec<ToolCall> {
        vec![ToolCall {
            id: "call_1".to_string(),
            name: "calculate_ctr".to_string(),
            arguments: json!({"clicks": 50, "impressions": 1000}),
            result: json!({"clicks": 50, "impressions": 1000, "ctr": 5.0}),
        }]
    }

    fn requested() -> Vec<ToolCallRequest> {
        vec![ToolCallRequest::new(
            "call_1",
            "calculate_ctr",
            "{\"clicks\":50,\"impressions\":1000}",
        )]
    }

    #[test]
    fn test_follow_up_message_order() {
        let history = vec![Message::user("earlier"), Message::assistant("answer")];
        let requested = requested();
        let executed = executed();
        let request = build_follow_up_request(&FollowUp {
            model: "gpt-4o",
            system_prompt: "prompt",
            history: &history,
            user_message: "What is my CTR?",
            requested: &requested,
            executed: &executed,
        });

        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant, Role::Tool]
        );

        let announcing = &request.messages[4];
        assert_eq!(announcing.content, None);
        assert_eq!(announcing.tool_calls, requested);

        let result = &request.messages[5];
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
        let content: serde_json::Value =
            serde_json::from_str(result.content.as_deref().unwrap()).unwrap();
        assert_eq!(content["ctr"], 5.0);

        assert!(request.tools.is_empty());
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn test_synthesize_returns_model_text() {
        let provider = MockProvider::new(vec![MockResponse::text("Your CTR is 5%.")]);
        let requested = requested();
        let executed = executed();
        let text = synthesize(
            &provider,
            FollowUp {
                model: "gpt-4o",
                system_prompt: "prompt",
                history: &[],
                user_message: "What is my CTR?",
                requested: &requested,
                executed: &executed,
            },
        )
        .await
        .unwrap();
        assert_eq!(text, "Your CTR is 5%.");
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_on_empty_text() {
        let provider = MockProvider::new(vec![MockResponse::text("")]);
        let text = synthesize(
            &provider,
            FollowUp {
                model: "gpt-4o",
                system_prompt: "prompt",
                history: &[],
                user_message: "hi",
                requested: &[],
                executed: &[],
            },
        )
        .await
        .unwrap();
        assert_eq!(text, SYNTHESIS_FALLBACK);
    }

    #[tokio::test]
    async fn test_synthesize_propagates_backend_failure() {
        let provider = MockProvider::new(vec![MockResponse::Error(ProviderError::ServerError(
            "unavailable".to_string(),
        ))]);
        let result = synthesize(
            &provider,
            FollowUp {
                model: "gpt-4o",
                system_prompt: "prompt",
                history: &[],
                user_message: "hi",
                requested: &[],
                executed: &[],
            },
        )
        .await;
        assert!(matches!(result, Err(ProviderError::ServerError(_))));
    }
}
