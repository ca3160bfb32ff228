//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// A failed mutation leaves the store exactly as it was before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unknown patient (or other addressed entity).
    #[error("not found: {0}")]
    NotFound(String),

    /// A precondition on the arguments failed; nothing was written.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant was violated (e.g. token digest collision).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking storage task failed to complete.
    #[error("storage task failed: {0}")]
    Task(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
