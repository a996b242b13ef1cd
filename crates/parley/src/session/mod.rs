pub mod state;
pub mod store;

// Re-export common session types
pub use state::{Session, SessionHandle};
pub use store::{InMemorySessionStore, SessionStore};
