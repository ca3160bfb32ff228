//! The access service: unified API over grants, authorization and records.
//!
//! Callers are identified by a verified [`Subject`]. Whether the subject acts
//! as a patient or a doctor is decided by the operation and checked against
//! the principal registry.

use std::sync::Arc;
use std::time::Duration;

use careaccess_core::{
    duration_millis, AccessPolicy, AccessToken, Clock, Decision, DoctorId, GrantSummary,
    MedicalRecord, OsTokenIssuer, PatientId, RecordPayload, Subject, TokenIssuer,
};
use careaccess_perms::{ensure_doctor, ensure_patient, AuthorizationGate, RevocationHandler};
use careaccess_store::{GrantStore, GrantStoreExt, IssueRequest, IssuedGrant};

use crate::error::Result;
use crate::writer::RecordWriter;

/// The main service struct.
///
/// Provides a unified API for:
/// - Registering patients and doctors
/// - Issuing and revoking grants
/// - Checking access and appending records
/// - Listing a patient's grants and records
/// - Sweeping dead grants
pub struct AccessService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    issuer: Arc<dyn TokenIssuer>,
    policy: AccessPolicy,
    gate: AuthorizationGate<S>,
    writer: RecordWriter<S>,
    revocation: RevocationHandler<S>,
}

impl<S: GrantStore + ?Sized> AccessService<S> {
    /// Create a service issuing tokens from the OS random source.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: AccessPolicy) -> Self {
        Self::with_issuer(store, clock, Arc::new(OsTokenIssuer), policy)
    }

    /// Create a service with a custom token issuer.
    pub fn with_issuer(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        issuer: Arc<dyn TokenIssuer>,
        policy: AccessPolicy,
    ) -> Self {
        let gate = AuthorizationGate::new(Arc::clone(&store), Arc::clone(&clock));
        let writer = RecordWriter::new(gate.clone(), Arc::clone(&store), Arc::clone(&clock));
        let revocation = RevocationHandler::new(Arc::clone(&store), Arc::clone(&clock));

        Self {
            store,
            clock,
            issuer,
            policy,
            gate,
            writer,
            revocation,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principal Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Register the caller as a patient. Returns `false` if already registered.
    pub async fn register_patient(&self, caller: &Subject) -> Result<bool> {
        let patient = caller.as_patient();
        let created = self
            .store
            .register_patient(&patient, self.clock.now_millis())
            .await?;
        if created {
            tracing::info!(%patient, "patient registered");
        }
        Ok(created)
    }

    /// Register the caller as a doctor. Returns `false` if already registered.
    pub async fn register_doctor(&self, caller: &Subject) -> Result<bool> {
        let doctor = caller.as_doctor();
        let created = self
            .store
            .register_doctor(&doctor, self.clock.now_millis())
            .await?;
        if created {
            tracing::info!(%doctor, "doctor registered");
        }
        Ok(created)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a grant from the calling patient to `doctor`.
    ///
    /// The returned token is the only copy; it is not recoverable later.
    pub async fn issue_grant(&self, caller: &Subject, doctor: &DoctorId) -> Result<IssuedGrant> {
        let patient = caller.as_patient();
        ensure_patient(self.store.as_ref(), &patient).await?;
        ensure_doctor(self.store.as_ref(), doctor).await?;

        let request = IssueRequest {
            patient_id: patient.clone(),
            doctor_id: doctor.clone(),
            duration: self.policy.grant_duration,
            max_uses: self.policy.token_use.max_uses(),
            renewal: self.policy.renewal,
        };
        let issued = self
            .store
            .issue_grant(self.issuer.as_ref(), request, self.clock.now_millis())
            .await?;

        tracing::info!(
            %patient,
            %doctor,
            grant = %issued.grant.id,
            expires_at = issued.grant.expires_at,
            "grant issued"
        );
        if issued.superseded > 0 {
            tracing::info!(%patient, %doctor, superseded = issued.superseded, "earlier grants superseded");
        }

        Ok(issued)
    }

    /// Revoke every active grant the calling patient holds for `doctor`.
    pub async fn revoke(&self, caller: &Subject, doctor: &DoctorId) -> Result<usize> {
        let revoked = self
            .revocation
            .revoke(caller, &caller.as_patient(), doctor)
            .await?;
        Ok(revoked)
    }

    /// The calling patient's grants with their current status.
    pub async fn list_grants(&self, caller: &Subject) -> Result<Vec<GrantSummary>> {
        let now = self.clock.now_millis();
        let grants = self.store.list_grants(&caller.as_patient()).await?;
        Ok(grants.iter().map(|g| g.summary(now)).collect())
    }

    /// Delete grants that stopped authorizing more than `retention` ago.
    pub async fn sweep(&self, retention: Duration) -> Result<usize> {
        let cutoff = self
            .clock
            .now_millis()
            .saturating_sub(duration_millis(retention));
        let purged = self.store.purge_grants(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, cutoff, "dead grants purged");
        } else {
            tracing::debug!(cutoff, "sweep found nothing to purge");
        }
        Ok(purged)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization and Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Consult the authorization gate directly.
    pub async fn check(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        token: &AccessToken,
    ) -> Result<Decision> {
        Ok(self.gate.check(patient, doctor, token).await?)
    }

    /// Append a record written by the calling doctor for `patient`.
    pub async fn append_record(
        &self,
        caller: &Subject,
        patient: &PatientId,
        token: &AccessToken,
        payload: RecordPayload,
    ) -> Result<MedicalRecord> {
        self.writer
            .append(patient, &caller.as_doctor(), token, payload)
            .await
    }

    /// The calling patient's records, oldest first.
    pub async fn list_records(&self, caller: &Subject) -> Result<Vec<MedicalRecord>> {
        Ok(self.store.list_records(&caller.as_patient()).await?)
    }
}
