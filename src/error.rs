//! Error types for newsrelay.

use thiserror::Error;

/// Common error type for newsrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Database error.
    ///
    /// Wraps errors from any database backend. Errors from sqlx are
    /// converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feed retrieval or parsing failed.
    #[error("feed error: {0}")]
    Fetch(String),

    /// Link shortening failed.
    ///
    /// Never returned from [`crate::shortener::LinkShortener::shorten`], which
    /// falls back to the original link.
    #[error("shorten error: {0}")]
    Shorten(String),

    /// Sending a message to the chat failed.
    #[error("post error: {0}")]
    Post(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Another run holds the lease.
    #[error("run lock held: {0}")]
    Locked(String),
}

impl From<sqlx::Error> for RelayError {
    fn from(e: sqlx::Error) -> Self {
        RelayError::Database(e.to_string())
    }
}

/// Result type alias for newsrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
