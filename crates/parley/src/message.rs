use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Roles to describe the origin of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation that has been executed, with its result attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub result: Value,
}

/// A single entry in a session's conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach executed tool calls. An empty list leaves the message without tool calls.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serialization_uses_camel_case() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "calculate_ctr".to_string(),
            arguments: json!({"clicks": 1, "impressions": 10}),
            result: json!({"ctr": 10.0}),
        };
        let message = Message::assistant("Your CTR is 10%").with_tool_calls(vec![call]);

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["toolCalls"][0]["name"], "calculate_ctr");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_empty_tool_calls_are_omitted() {
        let message = Message::assistant("hi").with_tool_calls(vec![]);
        assert!(message.tool_calls.is_none());

        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("toolCalls").is_none());
    }

    #[test]
    fn test_messages_get_distinct_ids() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id, b.id);
        assert_eq!(a.role.as_str(), "user");
    }
}
