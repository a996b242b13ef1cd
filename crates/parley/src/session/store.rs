use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use super::state::{Session, SessionHandle};

/// Where live sessions are kept, keyed by a caller-chosen name
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the session for `key`, creating it with defaults on first use
    async fn get_or_create(&self, key: &str) -> SessionHandle;
}

/// Sessions that live as long as the process
pub struct InMemorySessionStore {
    default_model: String,
    default_system_prompt: String,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new(default_model: impl Into<String>, default_system_prompt: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            default_system_prompt: default_system_prompt.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, key: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(key) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                let session = Session::new(&self.default_model, &self.default_system_prompt);
                info!(key, session_id = %session.session_id, "created session");
                SessionHandle::new(session)
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_same_key_returns_same_session() {
        let store = InMemorySessionStore::new("gpt-4o", "prompt");
        let first = store.get_or_create("default").await;
        first
            .update(|s| s.finish_turn(Message::assistant("hello")))
            .await;

        let second = store.get_or_create("default").await;
        let snapshot = second.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.model, "gpt-4o");
        assert_eq!(snapshot.system_prompt, "prompt");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new("gpt-4o", "prompt");
        let a = store.get_or_create("a").await.snapshot().await;
        let b = store.get_or_create("b").await.snapshot().await;
        assert_ne!(a.session_id, b.session_id);
        let again = store.get_or_create("a").await.snapshot().await;
        assert_eq!(again.session_id, a.session_id);
    }
}
