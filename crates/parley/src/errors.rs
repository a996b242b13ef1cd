use thiserror::Error;

use crate::providers::errors::ProviderError;

/// Turn-level failures reported to the caller of the chat agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session is already processing a message")]
    Busy,

    #[error("Backend error: {0}")]
    Backend(#[from] ProviderError),

    /// The task running the turn stopped before the turn could finish
    #[error("Turn interrupted: {0}")]
    Interrupted(String),
}
