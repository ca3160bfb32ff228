//! RecordWriter: check, then write. Never the other way round.

use std::sync::Arc;

use careaccess_core::{
    AccessToken, Clock, Decision, DoctorId, MedicalRecord, PatientId, RecordPayload,
};
use careaccess_perms::AuthorizationGate;
use careaccess_store::{CommitOutcome, GrantStore};

use crate::error::{AccessError, Result};

/// Appends medical records once the authorization gate allows it.
pub struct RecordWriter<S: ?Sized> {
    gate: AuthorizationGate<S>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for RecordWriter<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: GrantStore + ?Sized> RecordWriter<S> {
    pub fn new(gate: AuthorizationGate<S>, store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { gate, store, clock }
    }

    /// Append a record written by `doctor` for `patient`.
    ///
    /// The payload is validated, then the gate is consulted. Only an
    /// `Authorized` decision leads to a commit, and the commit itself
    /// re-validates the authorizing grant and spends its use. On any denial
    /// or storage failure nothing is persisted, no use is spent, and a denial
    /// carries its reason in [`AccessError::Denied`].
    pub async fn append(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        token: &AccessToken,
        payload: RecordPayload,
    ) -> Result<MedicalRecord> {
        payload.validate()?;

        let grant = match self.gate.check(patient, doctor, token).await? {
            Decision::Authorized(grant) => grant,
            Decision::Denied(reason) => return Err(AccessError::Denied { reason }),
        };

        let now = self.clock.now_millis();
        let record = MedicalRecord::new(patient.clone(), doctor.clone(), grant.id, payload, now);

        match self.store.commit_record(&record, now).await? {
            CommitOutcome::Committed => {
                tracing::info!(
                    %patient,
                    %doctor,
                    grant = %grant.id,
                    record = %record.id,
                    "medical record committed"
                );
                Ok(record)
            }
            CommitOutcome::Lapsed(reason) => {
                tracing::warn!(%patient, %doctor, grant = %grant.id, %reason, "grant lapsed before commit");
                Err(AccessError::Denied { reason })
            }
        }
    }
}
