//! Session management core module.
//!
//! One [`Session`](session::Session) per accepted connection, each holding a slot in
//! the process-wide [`SessionRegistry`](session_registry::SessionRegistry).

/// Per-connection line loop.
pub mod session;
/// Active session counter and id allocation.
pub mod session_registry;

#[cfg(test)]
mod integration_tests;

pub use session::{Session, SessionEnd};
pub use session_registry::{SessionGuard, SessionRegistry};
