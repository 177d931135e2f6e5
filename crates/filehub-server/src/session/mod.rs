//! Ephemeral session storage.
//!
//! [`TtlCache`] is a string key/value store with per-key expiry;
//! [`SessionStore`] maps session tokens to user ids on top of it.

pub mod cache;
pub mod sweep;
pub mod tokens;

pub use cache::TtlCache;
pub use sweep::spawn_sweeper;
pub use tokens::SessionStore;

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing store is not accepting operations.
    #[error("Session store unavailable")]
    Unavailable,
}
