//! Shared error types for the dial workspace.

use thiserror::Error;

/// Common result type for dial operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a service can hand back to the surface. Nothing in this
/// taxonomy is fatal to the daemon; each variant maps to an actionable
/// message for the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Row store operation error (wraps sqlx::Error)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller lacks the session required for this operation
    #[error("not allowed: {0}")]
    Unauthorized(String),

    /// The write collides with an existing row
    #[error("conflict: {0}")]
    Conflict(String),

    /// Duplicate vote on a suggestion. Distinct from `Conflict` so the
    /// surface can show the specific "already voted" message.
    #[error("already voted for this station")]
    AlreadyVoted,

    /// Playback start or resume failed; the session stays recoverable
    #[error("playback failed: {0}")]
    Playback(String),

    /// The external station directory could not be reached or answered
    /// with an error
    #[error("station directory unavailable: {0}")]
    Upstream(String),
}
