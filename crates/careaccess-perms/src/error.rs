//! Error types for the permissions module.

use careaccess_store::StoreError;
use thiserror::Error;

/// Errors that can occur during permission operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The caller may not act on this patient's grants.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The patient was never registered.
    #[error("unknown patient: {0}")]
    UnknownPatient(String),

    /// The doctor was never registered.
    #[error("unknown doctor: {0}")]
    UnknownDoctor(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
