// Pieces of a single chat turn, composed by the agent
pub mod completion;
pub mod follow_up;
pub mod tool_execution;

pub use completion::{build_turn_request, collect_completion, response_fragments};
pub use follow_up::{synthesize, FollowUp, SYNTHESIS_FALLBACK};
pub use tool_execution::{execute_tool_calls, parse_arguments, EXECUTION_FAILED};
