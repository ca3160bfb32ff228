//! In-memory implementation of the GrantStore trait.
//!
//! Each patient's grants and records live in their own shard behind their
//! own mutex. The patient directory lock is held only long enough to find a
//! shard, never while a shard is locked, so contention is scoped to a single
//! patient. Token digests are unique across the whole store; the digest set
//! is only ever locked while a shard is already held, never the other way
//! round.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;

use careaccess_core::{
    evaluate, Decision, DenyReason, DoctorId, Grant, MedicalRecord, PatientId, RenewalPolicy,
    TokenDigest,
};

use crate::error::{Result, StoreError};
use crate::traits::{CommitOutcome, GrantStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    doctors: RwLock<HashSet<DoctorId>>,
    patients: RwLock<HashMap<PatientId, Arc<Mutex<PatientShard>>>>,
    digests: Mutex<HashSet<[u8; 32]>>,
}

#[derive(Default)]
struct PatientShard {
    grants: Vec<Grant>,
    records: Vec<MedicalRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, patient: &PatientId) -> Result<Arc<Mutex<PatientShard>>> {
        let patients = self
            .patients
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        patients
            .get(patient)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("patient {patient}")))
    }

    fn shards(&self) -> Result<Vec<Arc<Mutex<PatientShard>>>> {
        let patients = self
            .patients
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(patients.values().cloned().collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| StoreError::Poisoned(e.to_string()))
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn register_patient(&self, patient: &PatientId, _now: i64) -> Result<bool> {
        let mut patients = self
            .patients
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if patients.contains_key(patient) {
            return Ok(false);
        }
        patients.insert(patient.clone(), Arc::default());
        Ok(true)
    }

    async fn register_doctor(&self, doctor: &DoctorId, _now: i64) -> Result<bool> {
        let mut doctors = self
            .doctors
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(doctors.insert(doctor.clone()))
    }

    async fn has_patient(&self, patient: &PatientId) -> Result<bool> {
        let patients = self
            .patients
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(patients.contains_key(patient))
    }

    async fn has_doctor(&self, doctor: &DoctorId) -> Result<bool> {
        let doctors = self
            .doctors
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(doctors.contains(doctor))
    }

    async fn insert_grant(
        &self,
        grant: &Grant,
        renewal: RenewalPolicy,
        now: i64,
    ) -> Result<usize> {
        let shard = self.shard(&grant.patient_id)?;
        let mut shard = lock(&shard)?;

        let collision = || {
            StoreError::Invariant(format!(
                "grant {} collides with an existing grant",
                grant.id
            ))
        };
        if shard.grants.iter().any(|g| g.id == grant.id) {
            return Err(collision());
        }
        if !lock(&self.digests)?.insert(*grant.token_digest.as_bytes()) {
            return Err(collision());
        }

        let mut superseded = 0;
        if renewal == RenewalPolicy::Replace {
            for existing in shard
                .grants
                .iter_mut()
                .filter(|g| g.doctor_id == grant.doctor_id)
            {
                if existing.revoke(now) {
                    superseded += 1;
                }
            }
        }

        shard.grants.push(grant.clone());
        Ok(superseded)
    }

    async fn revoke_grants(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        now: i64,
    ) -> Result<usize> {
        let shard = self.shard(patient)?;
        let mut shard = lock(&shard)?;

        let mut revoked = 0;
        for grant in shard.grants.iter_mut().filter(|g| &g.doctor_id == doctor) {
            if grant.revoke(now) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn authorize(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        presented: &TokenDigest,
        now: i64,
    ) -> Result<Decision> {
        let shard = self.shard(patient)?;
        let shard = lock(&shard)?;

        match evaluate(&shard.grants, doctor, presented, now) {
            Ok(index) => Ok(Decision::Authorized(shard.grants[index].clone())),
            Err(reason) => Ok(Decision::Denied(reason)),
        }
    }

    async fn list_grants(&self, patient: &PatientId) -> Result<Vec<Grant>> {
        let shard = self.shard(patient)?;
        let shard = lock(&shard)?;
        Ok(shard.grants.clone())
    }

    async fn purge_grants(&self, cutoff: i64) -> Result<usize> {
        let mut purged = 0;
        for shard in self.shards()? {
            let mut shard = lock(&shard)?;
            let (gone, kept): (Vec<Grant>, Vec<Grant>) = std::mem::take(&mut shard.grants)
                .into_iter()
                .partition(|g| g.is_purgeable(cutoff));
            shard.grants = kept;
            if !gone.is_empty() {
                let mut digests = lock(&self.digests)?;
                for grant in &gone {
                    digests.remove(grant.token_digest.as_bytes());
                }
            }
            purged += gone.len();
        }
        Ok(purged)
    }

    async fn commit_record(&self, record: &MedicalRecord, now: i64) -> Result<CommitOutcome> {
        let shard = self.shard(&record.patient_id)?;
        let mut shard = lock(&shard)?;

        let Some(grant) = shard.grants.iter_mut().find(|g| g.id == record.grant_id) else {
            return Ok(CommitOutcome::Lapsed(DenyReason::NoSuchGrant));
        };
        if grant.doctor_id != record.doctor_id {
            return Err(StoreError::Invariant(format!(
                "grant {} does not belong to doctor {}",
                grant.id, record.doctor_id
            )));
        }
        if let Err(reason) = grant.validate_for_commit(now) {
            return Ok(CommitOutcome::Lapsed(reason));
        }

        grant.record_use();
        shard.records.push(record.clone());
        Ok(CommitOutcome::Committed)
    }

    async fn list_records(&self, patient: &PatientId) -> Result<Vec<MedicalRecord>> {
        let shard = self.shard(patient)?;
        let shard = lock(&shard)?;
        Ok(shard.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careaccess_core::{OsTokenIssuer, RecordPayload, TokenIssuer};
    use std::time::Duration;

    const NOW: i64 = 1_000_000;

    fn ids() -> (PatientId, DoctorId) {
        (
            PatientId::new("patient").unwrap(),
            DoctorId::new("doctor").unwrap(),
        )
    }

    async fn store_with_patient() -> MemoryStore {
        let store = MemoryStore::new();
        let (patient, doctor) = ids();
        store.register_patient(&patient, NOW).await.unwrap();
        store.register_doctor(&doctor, NOW).await.unwrap();
        store
    }

    fn new_grant() -> (Grant, TokenDigest) {
        let (patient, doctor) = ids();
        let digest = OsTokenIssuer.issue().digest();
        let grant = Grant::new(patient, doctor, digest, NOW, Duration::from_secs(600), None);
        (grant, digest)
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let store = MemoryStore::new();
        let (patient, doctor) = ids();
        assert!(store.register_patient(&patient, NOW).await.unwrap());
        assert!(!store.register_patient(&patient, NOW).await.unwrap());
        assert!(store.register_doctor(&doctor, NOW).await.unwrap());
        assert!(!store.register_doctor(&doctor, NOW).await.unwrap());
        assert!(store.has_patient(&patient).await.unwrap());
        assert!(!store.has_patient(&PatientId::new("other").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_patient_is_not_found() {
        let store = MemoryStore::new();
        let (grant, _) = new_grant();
        let err = store
            .insert_grant(&grant, RenewalPolicy::Append, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_digest_collision_is_invariant_violation() {
        let store = store_with_patient().await;
        let (grant, _) = new_grant();
        store.insert_grant(&grant, RenewalPolicy::Append, NOW).await.unwrap();

        let mut twin = grant.clone();
        twin.id = careaccess_core::GrantId::generate();
        let err = store
            .insert_grant(&twin, RenewalPolicy::Append, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
        assert_eq!(store.list_grants(&grant.patient_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_digest_collision_across_patients() {
        let store = store_with_patient().await;
        let other = PatientId::new("other").unwrap();
        store.register_patient(&other, NOW).await.unwrap();
        let (grant, digest) = new_grant();
        store.insert_grant(&grant, RenewalPolicy::Append, NOW).await.unwrap();

        let (_, doctor) = ids();
        let twin = Grant::new(other.clone(), doctor, digest, NOW, Duration::from_secs(600), None);
        let err = store
            .insert_grant(&twin, RenewalPolicy::Append, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
        assert!(store.list_grants(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_releases_digest() {
        let store = store_with_patient().await;
        let (mut grant, _) = new_grant();
        grant.expires_at = NOW - 1;
        store.insert_grant(&grant, RenewalPolicy::Append, NOW).await.unwrap();
        assert_eq!(store.purge_grants(NOW).await.unwrap(), 1);

        let mut reissued = grant.clone();
        reissued.id = careaccess_core::GrantId::generate();
        store.insert_grant(&reissued, RenewalPolicy::Append, NOW).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_spends_use() {
        let store = store_with_patient().await;
        let (mut grant, digest) = new_grant();
        grant.max_uses = Some(1);
        store.insert_grant(&grant, RenewalPolicy::Append, NOW).await.unwrap();

        let (patient, doctor) = ids();
        // Checking alone spends nothing.
        for _ in 0..2 {
            let decision = store.authorize(&patient, &doctor, &digest, NOW).await.unwrap();
            assert!(decision.is_authorized());
        }

        let record = |diagnosis: &str| {
            MedicalRecord::new(
                patient.clone(),
                doctor.clone(),
                grant.id,
                RecordPayload::diagnosis(diagnosis),
                NOW,
            )
        };
        assert_eq!(
            store.commit_record(&record("flu"), NOW).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            store.commit_record(&record("cold"), NOW).await.unwrap(),
            CommitOutcome::Lapsed(DenyReason::Expired)
        );

        let after = store.authorize(&patient, &doctor, &digest, NOW).await.unwrap();
        assert_eq!(after, Decision::Denied(DenyReason::Expired));
        assert_eq!(store.list_records(&patient).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_rechecks_grant() {
        let store = store_with_patient().await;
        let (grant, _) = new_grant();
        store.insert_grant(&grant, RenewalPolicy::Append, NOW).await.unwrap();

        let (patient, doctor) = ids();
        let record = MedicalRecord::new(
            patient.clone(),
            doctor.clone(),
            grant.id,
            RecordPayload::diagnosis("flu"),
            NOW,
        );

        store.revoke_grants(&patient, &doctor, NOW).await.unwrap();
        let outcome = store.commit_record(&record, NOW).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Lapsed(DenyReason::Revoked));
        assert!(store.list_records(&patient).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_keeps_live_grants() {
        let store = store_with_patient().await;
        let (live, _) = new_grant();
        let (mut old, _) = new_grant();
        old.expires_at = NOW - 1;
        store.insert_grant(&live, RenewalPolicy::Append, NOW).await.unwrap();
        store.insert_grant(&old, RenewalPolicy::Append, NOW).await.unwrap();

        assert_eq!(store.purge_grants(NOW).await.unwrap(), 1);
        let remaining = store.list_grants(&live.patient_id).await.unwrap();
        assert_eq!(remaining, vec![live]);
    }
}
