//! Common error types for the song tracker

use thiserror::Error;

/// Common result type for song tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the service and its tooling
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists (duplicate email, etc.)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but lacks permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Message without the variant prefix, suitable for HTTP bodies
    pub fn message(&self) -> String {
        match self {
            Error::NotFound(msg)
            | Error::InvalidInput(msg)
            | Error::Conflict(msg)
            | Error::Unauthorized(msg)
            | Error::Forbidden(msg)
            | Error::Internal(msg)
            | Error::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
