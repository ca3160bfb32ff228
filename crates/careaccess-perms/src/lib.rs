//! # Care Access Permissions
//!
//! Decides who may write to a patient's records and lets the patient take
//! that permission back.
//!
//! ## Key Concepts
//!
//! - **AuthorizationGate**: consulted before every record write; answers
//!   `Authorized(grant)` or `Denied(reason)` from one atomic read
//! - **RevocationHandler**: patient-only revocation, immediate and idempotent
//! - **Guards**: explicit role and ownership checks called by the component
//!   performing a mutation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use careaccess_core::{AccessToken, DoctorId, PatientId, SystemClock};
//! use careaccess_perms::AuthorizationGate;
//! use careaccess_store::MemoryStore;
//!
//! async fn example(token: AccessToken) {
//!     let gate = AuthorizationGate::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock));
//!     let patient = PatientId::new("patient-1").unwrap();
//!     let doctor = DoctorId::new("doctor-1").unwrap();
//!     let decision = gate.check(&patient, &doctor, &token).await.unwrap();
//!     println!("authorized: {}", decision.is_authorized());
//! }
//! ```

pub mod error;
pub mod gate;
pub mod guard;
pub mod revocation;

pub use error::{PermsError, Result};
pub use gate::AuthorizationGate;
pub use guard::{ensure_doctor, ensure_owner, ensure_patient};
pub use revocation::RevocationHandler;
