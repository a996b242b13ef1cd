use futures::StreamExt;

use crate::accumulator::{Accumulated, DeltaAccumulator};
use crate::providers::base::{
    Completion, CompletionRequest, CompletionResponse, Fragment, RequestMessage,
};
use crate::providers::errors::ProviderError;
use crate::session::Session;
use crate::tools::Tool;

/// Build the first request of a turn.
///
/// The session's last message is the user message that opened the turn; only
/// `window` messages before it are sent along.
pub fn build_turn_request(
    session: &Session,
    window: usize,
    tools: Vec<Tool>,
    stream: bool,
) -> CompletionRequest {
    let mut messages = Vec::with_capacity(window + 2);
    messages.push(RequestMessage::system(session.system_prompt.clone()));
    messages.extend(session.prior_messages(window).iter().map(RequestMessage::from));
    if let Some(latest) = session.messages.last() {
        messages.push(RequestMessage::from(latest));
    }

    CompletionRequest::new(session.model.clone(), messages)
        .with_tools(tools)
        .with_stream(stream)
}

/// Restate a complete response as the fragments a stream would have carried
pub fn response_fragments(response: CompletionResponse) -> Vec<Fragment> {
    let mut fragments = Vec::with_capacity(response.tool_calls.len() + 1);
    if let Some(text) = response.text.filter(|text| !text.is_empty()) {
        fragments.push(Fragment::Text(text));
    }
    for (index, call) in response.tool_calls.into_iter().enumerate() {
        fragments.push(Fragment::ToolCall {
            index,
            id: Some(call.id),
            name: Some(call.name),
            arguments: Some(call.arguments),
        });
    }
    fragments
}

/// Wait for the whole completion, whichever shape the provider returned
pub async fn collect_completion(completion: Completion) -> Result<Accumulated, ProviderError> {
    match completion {
        Completion::Full(response) => Ok(Accumulated {
            text: response.text.unwrap_or_default(),
            tool_calls: response.tool_calls,
        }),
        Completion::Stream(mut stream) => {
            let mut accumulator = DeltaAccumulator::new();
            while let Some(fragment) = stream.next().await {
                accumulator.push(fragment?);
            }
            Ok(accumulator.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Role};
    use crate::providers::base::ToolCallRequest;

    fn session_with_history(count: usize) -> Session {
        let mut session = Session::new("gpt-4o", "system prompt");
        for i in 0..count {
            session.messages.push(Message::assistant(format!("reply {}", i)));
        }
        session
            .begin_turn(Message::user("What is my CTR?"), None)
            .unwrap()
    }

    #[test]
    fn test_turn_request_uses_bounded_window() {
        let session = session_with_history(8);
        let request = build_turn_request(&session, 5, vec![], false);

        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content.as_deref(), Some("system prompt"));
        assert_eq!(request.messages[1].content.as_deref(), Some("reply 3"));
        assert_eq!(request.messages[6].role, Role::User);
        assert_eq!(request.messages[6].content.as_deref(), Some("What is my CTR?"));
        assert_eq!(request.model, "gpt-4o");
        assert!(!request.stream);
    }

    #[test]
    fn test_turn_request_sends_user_message_once() {
        let session = session_with_history(0);
        let request = build_turn_request(&session, 5, vec![], true);
        let users = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
        assert_eq!(users, 1);
        assert!(request.stream);
    }

    #[test]
    fn test_response_fragments() {
        let response = CompletionResponse {
            text: Some("thinking".to_string()),
            tool_calls: vec![ToolCallRequest::new("call_1", "lookup", "{}")],
            ..Default::default()
        };
        let fragments = response_fragments(response);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], Fragment::text("thinking"));
    }

    #[tokio::test]
    async fn test_collect_stream_completion() {
        let stream = futures::stream::iter(vec![
            Ok(Fragment::text("a")),
            Ok(Fragment::text("b")),
        ])
        .boxed();
        let accumulated = collect_completion(Completion::Stream(stream)).await.unwrap();
        assert_eq!(accumulated.text, "ab");
    }

    #[tokio::test]
    async fn test_collect_stream_completion_propagates_failure() {
        let stream = futures::stream::iter(vec![
            Ok(Fragment::text("a")),
            Err(ProviderError::ServerError("gone".to_string())),
        ])
        .boxed();
        assert!(collect_completion(Completion::Stream(stream)).await.is_err());
    }
}
