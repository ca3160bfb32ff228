//! # Care Access
//!
//! Time-bound, revocable delegation of write access to a patient's medical
//! records.
//!
//! ## Overview
//!
//! A patient issues a grant to a doctor and hands over the returned token.
//! The doctor presents the token with every record write; the
//! [`RecordWriter`] consults the authorization gate first and persists only
//! on `Authorized`. The patient can revoke at any time, and revocation takes
//! effect immediately, even for a write already past its check.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use careaccess::AccessService;
//! use careaccess_core::{AccessPolicy, RecordPayload, Subject, SystemClock};
//! use careaccess_store::MemoryStore;
//!
//! async fn example() -> careaccess::Result<()> {
//!     let service = AccessService::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(SystemClock),
//!         AccessPolicy::default(),
//!     );
//!
//!     let patient = Subject::new("patient-1")?;
//!     let doctor = Subject::new("doctor-1")?;
//!     service.register_patient(&patient).await?;
//!     service.register_doctor(&doctor).await?;
//!
//!     let issued = service.issue_grant(&patient, &doctor.as_doctor()).await?;
//!     service
//!         .append_record(&doctor, &patient.as_patient(), &issued.token, RecordPayload::diagnosis("flu"))
//!         .await?;
//!
//!     service.revoke(&patient, &doctor.as_doctor()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod service;
pub mod writer;

pub use error::{AccessError, Result};
pub use service::AccessService;
pub use writer::RecordWriter;

// Re-export commonly used types
pub use careaccess_core::{
    AccessPolicy, AccessToken, Clock, Decision, DenyReason, DoctorId, GrantStatus, GrantSummary,
    MedicalRecord, PatientId, RecordPayload, RenewalPolicy, Subject, SystemClock, TokenUse,
};
pub use careaccess_store::{GrantStore, IssuedGrant, MemoryStore, SqliteStore, StoreError};
