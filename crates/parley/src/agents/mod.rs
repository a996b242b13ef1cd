mod agent;
pub mod reply_parts;

pub use agent::{
    AgentConfig, ChatAgent, ChatRequest, Reply, ReplyStream, DEFAULT_FOLLOW_UP_WINDOW,
    DEFAULT_HISTORY_WINDOW, DEFAULT_STREAM_BUFFER, EMPTY_REPLY_FALLBACK,
};
