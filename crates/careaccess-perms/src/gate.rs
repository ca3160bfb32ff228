//! The authorization gate.
//!
//! The single decision point consulted before any privileged write. A check
//! is answered from one atomic read of the patient's grants; there is no
//! separate existence lookup that could observe a different snapshot.

use std::sync::Arc;

use careaccess_core::{AccessToken, Clock, Decision, DenyReason, DoctorId, PatientId};
use careaccess_store::GrantStore;

use crate::error::{PermsError, Result};
use crate::guard;

/// Validates (patient, doctor, token) triples against the grant store.
pub struct AuthorizationGate<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for AuthorizationGate<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: GrantStore + ?Sized> AuthorizationGate<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Decide whether `doctor` may write for `patient` with `token`.
    ///
    /// A check never spends a use: a use-limited grant is spent only when a
    /// record commits against it.
    ///
    /// Fails with [`PermsError::UnknownPatient`] for an unregistered patient.
    /// An unregistered doctor cannot hold a grant and is denied with
    /// [`DenyReason::NoSuchGrant`].
    pub async fn check(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        token: &AccessToken,
    ) -> Result<Decision> {
        guard::ensure_patient(self.store.as_ref(), patient).await?;

        let decision = match guard::ensure_doctor(self.store.as_ref(), doctor).await {
            Ok(()) => {
                let now = self.clock.now_millis();
                self.store
                    .authorize(patient, doctor, &token.digest(), now)
                    .await?
            }
            Err(PermsError::UnknownDoctor(_)) => Decision::Denied(DenyReason::NoSuchGrant),
            Err(e) => return Err(e),
        };

        match &decision {
            Decision::Authorized(grant) => {
                tracing::debug!(%patient, %doctor, grant = %grant.id, "access authorized");
            }
            Decision::Denied(reason) => {
                tracing::warn!(%patient, %doctor, %reason, "access denied");
            }
        }

        Ok(decision)
    }
}
