//! Patient-initiated revocation.

use std::sync::Arc;

use careaccess_core::{Clock, DoctorId, PatientId, Subject};
use careaccess_store::GrantStore;

use crate::error::Result;
use crate::guard;

/// Revokes a doctor's grants on behalf of the owning patient.
pub struct RevocationHandler<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for RevocationHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: GrantStore + ?Sized> RevocationHandler<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Revoke every active grant `patient` holds for `doctor`.
    ///
    /// `caller` must be the patient. Takes effect immediately, regardless of
    /// expiry. Returns the number of grants revoked; revoking again, or
    /// revoking a doctor with no grants, returns zero.
    pub async fn revoke(
        &self,
        caller: &Subject,
        patient: &PatientId,
        doctor: &DoctorId,
    ) -> Result<usize> {
        guard::ensure_owner(caller, patient)?;
        guard::ensure_patient(self.store.as_ref(), patient).await?;

        let now = self.clock.now_millis();
        let revoked = self.store.revoke_grants(patient, doctor, now).await?;

        tracing::info!(%patient, %doctor, revoked, "grants revoked");
        Ok(revoked)
    }
}
