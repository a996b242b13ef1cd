pub mod accumulator;
pub mod agents;
pub mod errors;
pub mod message;
pub mod model;
pub mod providers;
pub mod session;
pub mod tools;

pub use agents::{ChatAgent, ChatRequest, Reply};
pub use errors::AgentError;
pub use message::{Message, Role, ToolCall};
pub use session::{Session, SessionHandle};
