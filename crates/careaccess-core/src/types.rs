//! Strong type definitions for delegated access.
//!
//! All identifiers are newtypes to prevent misuse at compile time: a
//! `DoctorId` can never be passed where a `PatientId` is expected.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Longest accepted subject identifier, in bytes.
pub const MAX_SUBJECT_LEN: usize = 256;

fn validate_subject(kind: &str, raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidArgument(format!("{kind} is required")));
    }
    if trimmed.len() > MAX_SUBJECT_LEN {
        return Err(CoreError::InvalidArgument(format!(
            "{kind} exceeds {MAX_SUBJECT_LEN} bytes"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CoreError::InvalidArgument(format!(
            "{kind} contains control characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Stable subject identifier of a patient, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId(String);

impl PatientId {
    /// Create a patient id, rejecting empty or oversized values.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        validate_subject("patient id", id.into()).map(Self)
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable subject identifier of a doctor acting as a delegate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoctorId(String);

impl DoctorId {
    /// Create a doctor id, rejecting empty or oversized values.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        validate_subject("doctor id", id.into()).map(Self)
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A caller identity that has already been verified by the identity provider.
///
/// A subject is role-less: whether it acts as a patient or a doctor is decided
/// by the operation and checked against the principal registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    /// Wrap a verified subject identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        validate_subject("subject", id.into()).map(Self)
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// View this subject as a patient.
    pub fn as_patient(&self) -> PatientId {
        PatientId(self.0.clone())
    }

    /// View this subject as a doctor.
    pub fn as_doctor(&self) -> DoctorId {
        DoctorId(self.0.clone())
    }

    /// Whether this subject is the given patient.
    pub fn is_patient(&self, patient: &PatientId) -> bool {
        self.0 == patient.0
    }
}

macro_rules! impl_subject_conversions {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

impl_subject_conversions!(PatientId);
impl_subject_conversions!(DoctorId);
impl_subject_conversions!(Subject);

/// A 16-byte random grant identifier.
///
/// Grant ids are not secrets; they address a grant for re-validation and
/// listing. The secret is the [`AccessToken`](crate::AccessToken).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GrantId(pub [u8; 16]);

impl GrantId {
    /// Generate a fresh random grant id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        decode_id(s).map(Self)
    }
}

/// A 16-byte random medical record identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(pub [u8; 16]);

impl RecordId {
    /// Generate a fresh random record id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        decode_id(s).map(Self)
    }
}

fn decode_id(s: &str) -> Result<[u8; 16]> {
    let bytes = hex::decode(s).map_err(|e| CoreError::InvalidIdentifier(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidIdentifier(format!("expected 16 bytes: {s}")))
}

macro_rules! impl_random_id {
    ($ty:ident) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({})"), self.to_hex())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self> {
                Self::from_hex(&value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.to_hex()
            }
        }
    };
}

impl_random_id!(GrantId);
impl_random_id!(RecordId);
