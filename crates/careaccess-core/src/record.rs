//! Medical records written by a delegated doctor.
//!
//! A record exists only as the side effect of a successful authorization
//! check and is immutable once created.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{DoctorId, GrantId, PatientId, RecordId};

/// Longest accepted diagnosis, in bytes.
pub const MAX_DIAGNOSIS_LEN: usize = 4 * 1024;

/// Longest accepted free-text notes, in bytes.
pub const MAX_NOTES_LEN: usize = 64 * 1024;

/// Most entries accepted in `symptoms` or `prescriptions`.
pub const MAX_LIST_ENTRIES: usize = 256;

/// The clinical content supplied by the doctor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordPayload {
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub prescriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RecordPayload {
    /// A payload with only a diagnosis.
    pub fn diagnosis(diagnosis: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            ..Self::default()
        }
    }

    /// Check required fields and size limits.
    pub fn validate(&self) -> Result<()> {
        if self.diagnosis.trim().is_empty() {
            return Err(CoreError::InvalidArgument("diagnosis is required".into()));
        }
        if self.diagnosis.len() > MAX_DIAGNOSIS_LEN {
            return Err(CoreError::InvalidArgument("diagnosis is too long".into()));
        }
        if self.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
            return Err(CoreError::InvalidArgument("notes are too long".into()));
        }
        for (field, list) in [("symptoms", &self.symptoms), ("prescriptions", &self.prescriptions)] {
            if list.len() > MAX_LIST_ENTRIES {
                return Err(CoreError::InvalidArgument(format!("too many {field}")));
            }
            if list.iter().any(|entry| entry.trim().is_empty()) {
                return Err(CoreError::InvalidArgument(format!("{field} contain an empty entry")));
            }
        }
        Ok(())
    }
}

/// A persisted medical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub id: RecordId,
    pub patient_id: PatientId,
    /// The authoring doctor.
    pub doctor_id: DoctorId,
    /// The grant that authorized the write.
    pub grant_id: GrantId,
    #[serde(flatten)]
    pub payload: RecordPayload,
    pub created_at: i64,
}

impl MedicalRecord {
    /// Stamp a new record authored under `grant_id`.
    pub fn new(
        patient_id: PatientId,
        doctor_id: DoctorId,
        grant_id: GrantId,
        payload: RecordPayload,
        created_at: i64,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            patient_id,
            doctor_id,
            grant_id,
            payload,
            created_at,
        }
    }
}
