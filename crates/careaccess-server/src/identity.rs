//! Caller identity.
//!
//! Extracts a JWT from `Authorization: Bearer <token>`, validates it, and
//! provides the verified [`Subject`] to downstream handlers via request
//! extensions.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use careaccess_core::Subject;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// Why a credential was not accepted.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing authorization token")]
    Missing,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Turns a bearer credential into a verified subject.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, bearer: &str) -> Result<Subject, IdentityError>;
}

/// JWT claims read from caller tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the caller's stable identifier.
    pub sub: String,
    /// Expiration (unix timestamp).
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Verifies HS256 JWTs issued by the identity provider.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, bearer: &str) -> Result<Subject, IdentityError> {
        let data = decode::<Claims>(bearer, &self.decoding_key, &self.validation)
            .map_err(|e| IdentityError::Invalid(e.to_string()))?;
        Subject::new(data.claims.sub).map_err(|e| IdentityError::Invalid(e.to_string()))
    }
}

/// Middleware that requires a verified caller.
///
/// On success the [`Subject`] is stored in request extensions for handlers
/// to extract via `Extension<Subject>`.
pub async fn require_identity(
    State(verifier): State<Arc<dyn IdentityVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(IdentityError::Missing)?;

    let subject = verifier.verify(bearer.trim()).map_err(|e| {
        tracing::debug!(error = %e, "caller credential rejected");
        e
    })?;

    request.extensions_mut().insert(subject);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &[u8] = b"test-secret";

    fn token(sub: &str, iss: Option<&str>, exp_offset: i64) -> String {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + exp_offset) as u64,
            iss: iss.map(str::to_string),
            aud: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let subject = verifier.verify(&token("alice", None, 3600)).unwrap();
        assert_eq!(subject.as_str(), "alice");
    }

    #[test]
    fn test_rejected_tokens() {
        let verifier = JwtVerifier::new(SECRET, Some("id.example.org"), None);

        assert!(verifier.verify("not-a-jwt").is_err());
        assert!(verifier.verify(&token("alice", None, 3600)).is_err());
        assert!(verifier.verify(&token("alice", Some("elsewhere"), 3600)).is_err());
        assert!(verifier
            .verify(&token("alice", Some("id.example.org"), -3600))
            .is_err());
        assert!(verifier
            .verify(&token("alice", Some("id.example.org"), 3600))
            .is_ok());

        let other_key = JwtVerifier::new(b"another-secret", None, None);
        assert!(other_key.verify(&token("alice", None, 3600)).is_err());
    }
}
