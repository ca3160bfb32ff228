//! GrantStore trait: the abstract interface for grant and record persistence.
//!
//! Every read-then-write operation on one patient's grants runs as a single
//! atomic section in the backend. Callers never read a grant collection,
//! mutate it in memory and write it back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use careaccess_core::{
    AccessToken, Decision, DenyReason, DoctorId, Grant, MedicalRecord, PatientId, RenewalPolicy,
    TokenDigest, TokenIssuer,
};

use crate::error::{Result, StoreError};

/// Result of committing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The record was persisted.
    Committed,
    /// The authorizing grant stopped being valid before the commit; nothing
    /// was written.
    Lapsed(DenyReason),
}

/// The GrantStore trait: async interface for grant and record persistence.
///
/// # Design Notes
///
/// - **Per-patient atomicity**: issuance, revocation, authorization and record
///   commit each observe and mutate one patient's grants atomically.
/// - **Unknown patient**: every patient-addressed operation fails with
///   [`StoreError::NotFound`] if the patient was never registered.
/// - **All-or-nothing**: a failed or abandoned call leaves no partial state.
#[async_trait]
pub trait GrantStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Principal Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a patient. Returns `false` if already registered.
    async fn register_patient(&self, patient: &PatientId, now: i64) -> Result<bool>;

    /// Register a doctor. Returns `false` if already registered.
    async fn register_doctor(&self, doctor: &DoctorId, now: i64) -> Result<bool>;

    /// Check whether a patient is registered.
    async fn has_patient(&self, patient: &PatientId) -> Result<bool>;

    /// Check whether a doctor is registered.
    async fn has_doctor(&self, doctor: &DoctorId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a grant to its patient's collection.
    ///
    /// With [`RenewalPolicy::Replace`] the doctor's earlier active grants are
    /// revoked in the same atomic section. Returns how many were revoked.
    ///
    /// A token digest that already exists is an invariant violation, not a
    /// retry case.
    async fn insert_grant(&self, grant: &Grant, renewal: RenewalPolicy, now: i64)
        -> Result<usize>;

    /// Revoke every active grant `patient` holds for `doctor`.
    ///
    /// Returns how many grants changed. Revoking nothing is not an error.
    async fn revoke_grants(&self, patient: &PatientId, doctor: &DoctorId, now: i64)
        -> Result<usize>;

    /// Decide whether `presented` authorizes `doctor` to write for `patient`.
    ///
    /// The decision is made from one consistent read of the patient's grants.
    /// Nothing is written; uses are spent by [`GrantStore::commit_record`].
    async fn authorize(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        presented: &TokenDigest,
        now: i64,
    ) -> Result<Decision>;

    /// All grants of a patient, oldest first.
    async fn list_grants(&self, patient: &PatientId) -> Result<Vec<Grant>>;

    /// Delete grants whose `expires_at` is before `cutoff`. Returns the count.
    async fn purge_grants(&self, cutoff: i64) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a record authorized by `record.grant_id`.
    ///
    /// The grant is re-validated in the same atomic section as the insert, so
    /// a revocation that lands after the check still prevents the write. A
    /// committed record spends one use of the grant in that same section;
    /// a lapsed or failed commit spends nothing.
    async fn commit_record(&self, record: &MedicalRecord, now: i64) -> Result<CommitOutcome>;

    /// All records of a patient, oldest first.
    async fn list_records(&self, patient: &PatientId) -> Result<Vec<MedicalRecord>>;
}

/// Parameters for issuing a grant.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub duration: Duration,
    pub max_uses: Option<u32>,
    pub renewal: RenewalPolicy,
}

impl IssueRequest {
    /// A multi-use, append-policy request.
    pub fn new(patient_id: PatientId, doctor_id: DoctorId, duration: Duration) -> Self {
        Self {
            patient_id,
            doctor_id,
            duration,
            max_uses: None,
            renewal: RenewalPolicy::Append,
        }
    }
}

/// A freshly issued grant and its one-time visible token.
#[derive(Debug, Clone)]
pub struct IssuedGrant {
    pub grant: Grant,
    pub token: AccessToken,
    /// Earlier grants revoked by a replace-policy issuance.
    pub superseded: usize,
}

/// Extension trait for common store patterns.
pub trait GrantStoreExt: GrantStore {
    /// Create a grant with a fresh token and append it to the patient's
    /// collection.
    ///
    /// A zero duration or a zero use limit is rejected before anything is
    /// written.
    fn issue_grant(
        &self,
        issuer: &dyn TokenIssuer,
        request: IssueRequest,
        now: i64,
    ) -> impl Future<Output = Result<IssuedGrant>> + Send;

    /// Return the grant only if it matches `doctor` and `token` exactly and
    /// is usable at `now`.
    fn find_active_grant(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        token: &AccessToken,
        now: i64,
    ) -> impl Future<Output = Result<Option<Grant>>> + Send;
}

impl<S: GrantStore + ?Sized> GrantStoreExt for S {
    async fn issue_grant(
        &self,
        issuer: &dyn TokenIssuer,
        request: IssueRequest,
        now: i64,
    ) -> Result<IssuedGrant> {
        if request.duration.is_zero() {
            return Err(StoreError::InvalidArgument(
                "grant duration must be positive".into(),
            ));
        }
        if request.max_uses == Some(0) {
            return Err(StoreError::InvalidArgument(
                "use limit must be positive".into(),
            ));
        }

        let token = issuer.issue();
        let grant = Grant::new(
            request.patient_id,
            request.doctor_id,
            token.digest(),
            now,
            request.duration,
            request.max_uses,
        );

        let superseded = self.insert_grant(&grant, request.renewal, now).await?;

        Ok(IssuedGrant {
            grant,
            token,
            superseded,
        })
    }

    async fn find_active_grant(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        token: &AccessToken,
        now: i64,
    ) -> Result<Option<Grant>> {
        match self
            .authorize(patient, doctor, &token.digest(), now)
            .await?
        {
            Decision::Authorized(grant) => Ok(Some(grant)),
            Decision::Denied(_) => Ok(None),
        }
    }
}
