//! Opaque access tokens.
//!
//! A token is 32 bytes from the operating system CSPRNG, hex encoded. Only
//! its BLAKE3 digest is ever persisted; the raw value is handed to the
//! patient once, at issuance, and presented back by the doctor.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of random bytes in a token (256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

/// Longest token string accepted from a caller.
pub const MAX_PRESENTED_TOKEN_LEN: usize = 512;

/// Domain separation context for token digests.
const DIGEST_CONTEXT: &str = "careaccess 2024 access-token digest v1";

/// An opaque bearer secret proving possession of one grant.
///
/// `Debug` output is redacted so tokens never reach logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token presented by a caller.
    ///
    /// The token is opaque: any non-empty string of bounded length is
    /// accepted here and simply fails to match if it was never issued.
    pub fn from_presented(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(CoreError::InvalidArgument("access token is required".into()));
        }
        if token.len() > MAX_PRESENTED_TOKEN_LEN {
            return Err(CoreError::InvalidArgument("access token is too long".into()));
        }
        Ok(Self(token))
    }

    /// The secret value. Callers must not log it.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Compute the digest under which the token is stored.
    pub fn digest(&self) -> TokenDigest {
        let mut hasher = blake3::Hasher::new_derive_key(DIGEST_CONTEXT);
        hasher.update(self.0.as_bytes());
        TokenDigest(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// BLAKE3 digest of an access token.
///
/// Equality is constant-time, so comparing a presented digest against every
/// stored digest reveals nothing about how many leading bytes matched.
#[derive(Clone, Copy, Eq)]
pub struct TokenDigest(pub [u8; 32]);

impl TokenDigest {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for TokenDigest {
    fn eq(&self, other: &Self) -> bool {
        blake3::Hash::from(self.0) == blake3::Hash::from(other.0)
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({})", &hex::encode(self.0)[..16])
    }
}

/// Source of fresh access tokens.
pub trait TokenIssuer: Send + Sync {
    /// Produce a new, never-before-seen token.
    fn issue(&self) -> AccessToken;
}

/// Issues tokens from the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsTokenIssuer;

impl TokenIssuer for OsTokenIssuer {
    fn issue(&self) -> AccessToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        AccessToken(hex::encode(bytes))
    }
}
