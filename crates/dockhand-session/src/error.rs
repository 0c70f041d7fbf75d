//! Error types for the session store

use thiserror::Error;

/// Errors produced by [`crate::SessionStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No live session with this id (never created, deleted, or expired)
    #[error("session not found: {0}")]
    NotFound(String),

    /// Capacity reached and a forced sweep freed nothing
    #[error("session limit exceeded: {max} active sessions")]
    LimitExceeded { max: usize },

    /// A live session already uses this id
    #[error("session already exists: {0}")]
    AlreadyExists(String),
}

/// Result type for session store operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
