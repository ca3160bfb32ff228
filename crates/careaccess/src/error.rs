//! Error types for the access service.

use careaccess_core::{CoreError, DenyReason};
use careaccess_perms::PermsError;
use careaccess_store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`AccessService`](crate::AccessService).
///
/// A failed mutation leaves storage in its pre-call state. Storage failures
/// are never retried internally, so a grant is never issued twice.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed or missing request fields. Nothing was written.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown patient or doctor.
    #[error("not found: {0}")]
    NotFound(String),

    /// The authorization gate refused the write.
    #[error("access denied: {reason}")]
    Denied { reason: DenyReason },

    /// The caller may not perform this action on the target patient.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The persistence layer failed.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),
}

impl From<StoreError> for AccessError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AccessError::NotFound(what),
            StoreError::InvalidArgument(msg) => AccessError::InvalidArgument(msg),
            other => AccessError::StorageFailure(other),
        }
    }
}

impl From<PermsError> for AccessError {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::PermissionDenied(msg) => AccessError::Forbidden(msg),
            PermsError::UnknownPatient(id) => AccessError::NotFound(format!("patient {id}")),
            PermsError::UnknownDoctor(id) => AccessError::NotFound(format!("doctor {id}")),
            PermsError::Store(e) => e.into(),
        }
    }
}

impl From<CoreError> for AccessError {
    fn from(e: CoreError) -> Self {
        AccessError::InvalidArgument(e.to_string())
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert!(matches!(
            AccessError::from(StoreError::NotFound("patient x".into())),
            AccessError::NotFound(_)
        ));
        assert!(matches!(
            AccessError::from(StoreError::Invariant("collision".into())),
            AccessError::StorageFailure(_)
        ));
        assert!(matches!(
            AccessError::from(PermsError::Store(StoreError::Poisoned("lock".into()))),
            AccessError::StorageFailure(_)
        ));
    }

    #[test]
    fn test_perms_errors_map_to_taxonomy() {
        assert!(matches!(
            AccessError::from(PermsError::PermissionDenied("no".into())),
            AccessError::Forbidden(_)
        ));
        assert!(matches!(
            AccessError::from(PermsError::UnknownDoctor("bob".into())),
            AccessError::NotFound(_)
        ));
    }
}
