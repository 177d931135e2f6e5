//! Error types for the `filehub` core library.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving configuration and reading settings files.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// An environment override that does not parse as the expected type.
    #[error("Invalid value for {key}: {value}")]
    Env { key: String, value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
