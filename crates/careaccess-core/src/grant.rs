//! Grants and the authorization decision.
//!
//! A grant is one patient delegating one doctor time-bound write permission.
//! A grant is usable iff it is not revoked, `now < expires_at`, its use limit
//! (if any) is not exhausted, and the presented token digest matches.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::duration_millis;
use crate::token::TokenDigest;
use crate::types::{DoctorId, GrantId, PatientId};

/// State of a single grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Addressable id of this grant.
    pub id: GrantId,

    /// The patient who issued the grant and owns it.
    pub patient_id: PatientId,

    /// The delegate.
    pub doctor_id: DoctorId,

    /// Digest of the access token. The raw token is never stored.
    pub token_digest: TokenDigest,

    /// When the grant was issued (Unix ms).
    pub issued_at: i64,

    /// When the grant stops authorizing (Unix ms, exclusive).
    pub expires_at: i64,

    /// Whether the patient has revoked this grant. One-way.
    pub revoked: bool,

    /// When it was revoked (if revoked).
    pub revoked_at: Option<i64>,

    /// Maximum number of successful checks, or unlimited.
    pub max_uses: Option<u32>,

    /// Number of successful checks so far.
    pub use_count: u32,
}

/// Derived lifecycle status of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Expired,
    Revoked,
}

/// Why an authorization check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No grant for this doctor and no grant carrying this token.
    NoSuchGrant,
    /// The matching grant has expired or used up its allowance.
    Expired,
    /// The matching grant was revoked by the patient.
    Revoked,
    /// The token does not belong to a grant for this doctor.
    TokenMismatch,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::NoSuchGrant => "no such grant",
            DenyReason::Expired => "grant expired",
            DenyReason::Revoked => "grant revoked",
            DenyReason::TokenMismatch => "token mismatch",
        };
        f.write_str(s)
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The grant authorizes the write. Carries the grant as read.
    Authorized(Grant),
    /// The write must not happen.
    Denied(DenyReason),
}

impl Decision {
    /// Whether this decision authorizes the write.
    pub fn is_authorized(&self) -> bool {
        matches!(self, Decision::Authorized(_))
    }

    /// The denial reason, if denied.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Authorized(_) => None,
            Decision::Denied(reason) => Some(*reason),
        }
    }
}

impl Grant {
    /// Create a new, unrevoked grant valid for `duration` from `issued_at`.
    pub fn new(
        patient_id: PatientId,
        doctor_id: DoctorId,
        token_digest: TokenDigest,
        issued_at: i64,
        duration: Duration,
        max_uses: Option<u32>,
    ) -> Self {
        Self {
            id: GrantId::generate(),
            patient_id,
            doctor_id,
            token_digest,
            issued_at,
            expires_at: issued_at.saturating_add(duration_millis(duration)),
            revoked: false,
            revoked_at: None,
            max_uses,
            use_count: 0,
        }
    }

    /// Whether the grant's time window has closed.
    pub fn is_time_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether the grant has no uses left.
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.use_count >= max)
    }

    /// Derived status at `now`. Revocation takes precedence over expiry.
    pub fn status(&self, now: i64) -> GrantStatus {
        if self.revoked {
            GrantStatus::Revoked
        } else if self.is_time_expired(now) || self.is_exhausted() {
            GrantStatus::Expired
        } else {
            GrantStatus::Active
        }
    }

    /// Whether the grant authorizes a check at `now`.
    pub fn is_usable(&self, now: i64) -> bool {
        self.status(now) == GrantStatus::Active
    }

    /// Re-validate the authorizing grant when a record commits.
    ///
    /// The commit is where a use is spent, so an exhausted grant fails here
    /// even if an earlier check passed.
    pub fn validate_for_commit(&self, now: i64) -> Result<(), DenyReason> {
        match self.status(now) {
            GrantStatus::Active => Ok(()),
            GrantStatus::Expired => Err(DenyReason::Expired),
            GrantStatus::Revoked => Err(DenyReason::Revoked),
        }
    }

    /// Revoke the grant if it is still active. Returns whether it changed.
    pub fn revoke(&mut self, now: i64) -> bool {
        if self.status(now) != GrantStatus::Active {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(now);
        true
    }

    /// Record a committed write.
    pub fn record_use(&mut self) {
        self.use_count = self.use_count.saturating_add(1);
    }

    /// Whether the sweep may delete this grant. Revoked grants are kept
    /// until their natural expiry so patients can still list them.
    pub fn is_purgeable(&self, cutoff: i64) -> bool {
        self.expires_at < cutoff
    }

    /// A view safe to hand to the owning patient.
    pub fn summary(&self, now: i64) -> GrantSummary {
        GrantSummary {
            grant_id: self.id,
            doctor_id: self.doctor_id.clone(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            status: self.status(now),
            use_count: self.use_count,
            max_uses: self.max_uses,
        }
    }
}

/// Patient-facing projection of a grant. Never carries the token digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantSummary {
    pub grant_id: GrantId,
    pub doctor_id: DoctorId,
    pub issued_at: i64,
    pub expires_at: i64,
    pub status: GrantStatus,
    pub use_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
}

/// Decide whether `presented` authorizes `doctor` against one patient's grants.
///
/// Returns the index of the usable grant, or the denial reason. Every grant is
/// compared, with no early exit, so the work done does not depend on where
/// (or whether) a match sits in the collection.
pub fn evaluate(
    grants: &[Grant],
    doctor: &DoctorId,
    presented: &TokenDigest,
    now: i64,
) -> Result<usize, DenyReason> {
    let mut matched: Option<usize> = None;
    let mut foreign_match = false;
    let mut doctor_known = false;

    for (index, grant) in grants.iter().enumerate() {
        let token_eq = grant.token_digest == *presented;
        let doctor_eq = grant.doctor_id == *doctor;
        doctor_known |= doctor_eq;
        if token_eq {
            if doctor_eq {
                matched = Some(index);
            } else {
                foreign_match = true;
            }
        }
    }

    match matched {
        Some(index) => match grants[index].status(now) {
            GrantStatus::Active => Ok(index),
            GrantStatus::Expired => Err(DenyReason::Expired),
            GrantStatus::Revoked => Err(DenyReason::Revoked),
        },
        None if foreign_match || doctor_known => Err(DenyReason::TokenMismatch),
        None => Err(DenyReason::NoSuchGrant),
    }
}
