/// dbsession Error Module
///
/// Defines the classified error type for the crate. Every operation on a
/// session returns this one type, so callers handle query, procedure,
/// scalar, and transaction failures uniformly instead of mixing sentinel
/// return values with raised errors.
use thiserror::Error;

/// Error type covering all failure classes of the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Errors propagated from the underlying SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Command configuration errors (empty query text or procedure name)
    #[error("Command error: {0}")]
    Command(String),

    /// Failures inside a session-managed transaction; the transaction has
    /// been rolled back by the time this error is returned
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Connection profile errors (unprovisioned deployment mode, bad file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result to use SessionError as the error type.
pub type Result<T> = std::result::Result<T, SessionError>;
