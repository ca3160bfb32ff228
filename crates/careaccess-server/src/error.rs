//! HTTP error rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use careaccess::AccessError;
use serde_json::json;

use crate::identity::IdentityError;

/// The message every authorization denial renders with. Which check failed
/// is logged, never returned.
pub const DENIED_MESSAGE: &str = "invalid or expired access token";

/// Error returned by handlers and middleware.
#[derive(Debug)]
pub enum ApiError {
    /// A service error from the access layer.
    Access(AccessError),
    /// Malformed request body or missing field.
    BadRequest(String),
    /// Missing or invalid caller credentials.
    Unauthenticated(String),
}

impl ApiError {
    /// HTTP status and stable machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Access(AccessError::InvalidArgument(_)) | ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            ApiError::Access(AccessError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Access(AccessError::Denied { .. }) => {
                (StatusCode::FORBIDDEN, "PERMISSION_DENIED")
            }
            ApiError::Access(AccessError::Forbidden(_)) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Access(AccessError::StorageFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
            }
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Access(AccessError::Denied { .. }) => DENIED_MESSAGE.to_string(),
            ApiError::Access(AccessError::StorageFailure(_)) => "storage unavailable".to_string(),
            ApiError::Access(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::Unauthenticated(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Access(AccessError::StorageFailure(e)) = &self {
            tracing::error!(error = %e, "storage failure");
        }

        let (status, code) = self.status_and_code();
        let body = Json(json!({
            "code": code,
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        ApiError::Access(e)
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        ApiError::Unauthenticated(e.to_string())
    }
}

impl From<careaccess_core::CoreError> for ApiError {
    fn from(e: careaccess_core::CoreError) -> Self {
        ApiError::Access(e.into())
    }
}
