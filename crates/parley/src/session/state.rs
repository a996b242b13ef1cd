use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AgentError;
use crate::message::Message;

/// Conversation state for one session.
///
/// Values move forward only through the transition functions below; each one
/// consumes the current state and returns the next.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub system_prompt: String,
    pub is_processing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_buffer: Option<String>,
}

impl Session {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            is_processing: false,
            streaming_buffer: None,
        }
    }

    /// Enter the processing state with a new user message.
    ///
    /// Fails with `AgentError::Busy` while a previous turn is still running.
    pub fn begin_turn(mut self, user: Message, model: Option<&str>) -> Result<Self, AgentError> {
        if self.is_processing {
            return Err(AgentError::Busy);
        }
        if let Some(model) = model.filter(|m| !m.is_empty() && *m != self.model) {
            self.model = model.to_string();
        }
        self.messages.push(user);
        self.is_processing = true;
        Ok(self)
    }

    pub fn start_streaming(mut self) -> Self {
        self.streaming_buffer = Some(String::new());
        self
    }

    pub fn append_stream_text(mut self, text: &str) -> Self {
        self.streaming_buffer
            .get_or_insert_with(String::new)
            .push_str(text);
        self
    }

    /// Drop in-flight text without ending the turn
    pub fn discard_stream(mut self) -> Self {
        self.streaming_buffer = None;
        self
    }

    pub fn finish_turn(mut self, assistant: Message) -> Self {
        self.messages.push(assistant);
        self.streaming_buffer = None;
        self.is_processing = false;
        self
    }

    /// End a failed turn. Messages already appended are kept.
    pub fn abort_turn(mut self) -> Self {
        self.streaming_buffer = None;
        self.is_processing = false;
        self
    }

    /// Empty the message log, keeping identity, model and prompt.
    ///
    /// Fails with `AgentError::Busy` while a turn is running, since the turn
    /// still has a reply to append.
    pub fn clear(mut self) -> Result<Self, AgentError> {
        if self.is_processing {
            return Err(AgentError::Busy);
        }
        self.messages.clear();
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The last `window` messages before the most recent one
    pub fn prior_messages(&self, window: usize) -> &[Message] {
        let prior = &self.messages[..self.messages.len().saturating_sub(1)];
        &prior[prior.len().saturating_sub(window)..]
    }
}

/// Shared, live view of a session.
///
/// Readers take snapshots; the task running a turn is the only writer while
/// `is_processing` is set.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }

    pub async fn update(&self, transition: impl FnOnce(Session) -> Session) {
        let mut guard = self.inner.write().await;
        let current = std::mem::take(&mut *guard);
        *guard = transition(current);
    }

    /// Apply a fallible transition; on error the state is left untouched
    pub async fn try_update<E>(
        &self,
        transition: impl FnOnce(Session) -> Result<Session, E>,
    ) -> Result<Session, E> {
        let mut guard = self.inner.write().await;
        let next = transition(guard.clone())?;
        *guard = next;
        Ok(guard.clone())
    }
}
