//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use careaccess::{AccessService, Result};
use careaccess_core::{AccessPolicy, AccessToken, Clock, ManualClock, Subject};
use careaccess_store::{GrantStore, MemoryStore};

/// A test fixture with a store, a manual clock and a service over both.
pub struct TestFixture<S: GrantStore = MemoryStore> {
    pub store: Arc<S>,
    pub clock: Arc<ManualClock>,
    pub service: AccessService<S>,
}

impl TestFixture<MemoryStore> {
    /// Create a fixture over a fresh in-memory store with the default policy.
    pub fn new() -> Self {
        Self::with_policy(AccessPolicy::default())
    }

    /// Create a fixture over a fresh in-memory store.
    pub fn with_policy(policy: AccessPolicy) -> Self {
        Self::with_store(MemoryStore::new(), policy)
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GrantStore> TestFixture<S> {
    /// Create a fixture over any store.
    pub fn with_store(store: S, policy: AccessPolicy) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::default());
        let service = AccessService::new(Arc::clone(&store), clock.clone(), policy);
        Self {
            store,
            clock,
            service,
        }
    }

    /// Current fixture time in Unix ms.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Move the fixture clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Register a patient and return their subject.
    pub async fn patient(&self, name: &str) -> Result<Subject> {
        let subject = Subject::new(name)?;
        self.service.register_patient(&subject).await?;
        Ok(subject)
    }

    /// Register a doctor and return their subject.
    pub async fn doctor(&self, name: &str) -> Result<Subject> {
        let subject = Subject::new(name)?;
        self.service.register_doctor(&subject).await?;
        Ok(subject)
    }

    /// Issue a grant from `patient` to `doctor` and return the token.
    pub async fn grant(&self, patient: &Subject, doctor: &Subject) -> Result<AccessToken> {
        let issued = self
            .service
            .issue_grant(patient, &doctor.as_doctor())
            .await?;
        Ok(issued.token)
    }
}

/// Register `count` doctors named `doctor-0`, `doctor-1`, ...
pub async fn doctors<S: GrantStore>(fixture: &TestFixture<S>, count: usize) -> Result<Vec<Subject>> {
    let mut subjects = Vec::with_capacity(count);
    for i in 0..count {
        subjects.push(fixture.doctor(&format!("doctor-{i}")).await?);
    }
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_issues_usable_grant() {
        let fixture = TestFixture::new();
        let patient = fixture.patient("alice").await.unwrap();
        let doctor = fixture.doctor("bob").await.unwrap();
        let token = fixture.grant(&patient, &doctor).await.unwrap();

        let decision = fixture
            .service
            .check(&patient.as_patient(), &doctor.as_doctor(), &token)
            .await
            .unwrap();
        assert!(decision.is_authorized());
    }

    #[tokio::test]
    async fn test_doctors_helper() {
        let fixture = TestFixture::new();
        let registered = doctors(&fixture, 3).await.unwrap();
        assert_eq!(registered.len(), 3);
        for d in &registered {
            assert!(fixture.store.has_doctor(&d.as_doctor()).await.unwrap());
        }
    }
}
