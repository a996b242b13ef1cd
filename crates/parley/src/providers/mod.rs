pub mod base;
pub mod errors;
pub mod formats;
pub mod mock;
pub mod openai;
pub mod sse;
pub mod utils;

pub use base::{
    Completion, CompletionRequest, CompletionResponse, Fragment, FragmentStream, Provider,
    RequestMessage, ToolCallRequest, Usage,
};
