//! Authentication for filehub.
//!
//! Provides password digests, Basic credential parsing, and the session-token
//! sign-in / sign-out flow.

pub mod basic;
pub mod flow;
pub mod password;

pub use basic::Credentials;
pub use flow::AuthFlow;

use filehub_core::db::DatabaseError;

use crate::session::SessionError;

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad or missing credentials, or an unknown/expired token. Deliberately
    /// carries no detail about which check failed.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
