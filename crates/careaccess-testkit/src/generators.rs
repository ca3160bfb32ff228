//! Proptest generators for property-based testing.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use proptest::prelude::*;

use careaccess_core::{DoctorId, PatientId, RecordPayload};

/// Generate a plausible subject identifier.
pub fn subject_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}"
}

/// Generate a random PatientId.
pub fn patient_id() -> impl Strategy<Value = PatientId> {
    subject_id().prop_filter_map("valid patient id", |s| PatientId::new(s).ok())
}

/// Generate a random DoctorId.
pub fn doctor_id() -> impl Strategy<Value = DoctorId> {
    subject_id().prop_filter_map("valid doctor id", |s| DoctorId::new(s).ok())
}

/// Generate a set of distinct doctors.
pub fn distinct_doctors(size: RangeInclusive<usize>) -> impl Strategy<Value = Vec<DoctorId>> {
    prop::collection::hash_set(subject_id(), size).prop_map(|ids: HashSet<String>| {
        ids.into_iter().filter_map(|s| DoctorId::new(s).ok()).collect()
    })
}

/// Generate a record payload that passes validation.
pub fn record_payload() -> impl Strategy<Value = RecordPayload> {
    let entry = "[A-Za-z][A-Za-z ]{0,23}";
    (
        "[A-Za-z][A-Za-z ]{0,63}",
        prop::collection::vec(entry, 0..4),
        prop::collection::vec(entry, 0..4),
        prop::option::of("[ -~]{1,200}"),
    )
        .prop_map(|(diagnosis, symptoms, prescriptions, notes)| RecordPayload {
            diagnosis,
            symptoms,
            prescriptions,
            notes,
        })
}
