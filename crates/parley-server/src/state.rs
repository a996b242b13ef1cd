use axum::http::HeaderMap;
use parley::session::{SessionHandle, SessionStore};
use parley::ChatAgent;
use std::sync::Arc;

pub const SESSION_HEADER: &str = "x-session-id";
pub const DEFAULT_SESSION: &str = "default";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ChatAgent>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(agent: ChatAgent, sessions: impl SessionStore + 'static) -> Self {
        Self {
            agent: Arc::new(agent),
            sessions: Arc::new(sessions),
        }
    }

    /// The session named by the `X-Session-Id` header, or the default one
    pub async fn session(&self, headers: &HeaderMap) -> SessionHandle {
        let key = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or(DEFAULT_SESSION);
        self.sessions.get_or_create(key).await
    }
}
