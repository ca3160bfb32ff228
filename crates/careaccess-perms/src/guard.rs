//! Role guards.
//!
//! Cross-entity checks (is this subject a registered patient, a registered
//! doctor, the owner of these grants) are plain functions called by the
//! component about to mutate state. Nothing runs implicitly on save.

use careaccess_core::{DoctorId, PatientId, Subject};
use careaccess_store::GrantStore;

use crate::error::{PermsError, Result};

/// Fail with [`PermsError::UnknownPatient`] unless `patient` is registered.
pub async fn ensure_patient<S>(store: &S, patient: &PatientId) -> Result<()>
where
    S: GrantStore + ?Sized,
{
    if store.has_patient(patient).await? {
        Ok(())
    } else {
        Err(PermsError::UnknownPatient(patient.to_string()))
    }
}

/// Fail with [`PermsError::UnknownDoctor`] unless `doctor` is registered.
pub async fn ensure_doctor<S>(store: &S, doctor: &DoctorId) -> Result<()>
where
    S: GrantStore + ?Sized,
{
    if store.has_doctor(doctor).await? {
        Ok(())
    } else {
        Err(PermsError::UnknownDoctor(doctor.to_string()))
    }
}

/// Only the patient may manage their own grants.
pub fn ensure_owner(caller: &Subject, patient: &PatientId) -> Result<()> {
    if caller.is_patient(patient) {
        Ok(())
    } else {
        Err(PermsError::PermissionDenied(format!(
            "{caller} does not own the grants of {patient}"
        )))
    }
}
