pub mod configuration;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

// Re-export commonly used items
pub use error::*;
pub use state::*;
