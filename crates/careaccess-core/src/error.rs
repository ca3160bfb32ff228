//! Error types for the core primitives.

use thiserror::Error;

/// Errors raised while constructing or validating core values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required field was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A hex-encoded identifier could not be decoded.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
