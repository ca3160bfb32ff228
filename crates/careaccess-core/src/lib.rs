//! # Care Access Core
//!
//! Primitives for time-bound delegated write access to a patient's medical
//! records.
//!
//! ## Key Concepts
//!
//! - **Grant**: one patient delegating one doctor write permission until
//!   `expires_at`, revocable at any time by the patient
//! - **Token**: opaque 256-bit secret proving possession of a grant; stored
//!   only as a digest
//! - **Decision**: the outcome of matching a presented token against a
//!   patient's grants, made from one consistent view of those grants
//! - **MedicalRecord**: immutable record created only after an authorized check
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use careaccess_core::{evaluate, DoctorId, Grant, OsTokenIssuer, PatientId, TokenIssuer};
//!
//! let patient = PatientId::new("patient-1").unwrap();
//! let doctor = DoctorId::new("doctor-1").unwrap();
//! let token = OsTokenIssuer.issue();
//! let grant = Grant::new(patient, doctor.clone(), token.digest(), 0, Duration::from_secs(600), None);
//!
//! assert_eq!(evaluate(&[grant], &doctor, &token.digest(), 1_000), Ok(0));
//! ```

pub mod clock;
pub mod error;
pub mod grant;
pub mod policy;
pub mod record;
pub mod token;
pub mod types;

pub use clock::{duration_millis, Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use grant::{evaluate, Decision, DenyReason, Grant, GrantStatus, GrantSummary};
pub use policy::{
    AccessPolicy, RenewalPolicy, TokenUse, DEFAULT_GRANT_DURATION, MAX_GRANT_DURATION,
    MIN_GRANT_DURATION,
};
pub use record::{MedicalRecord, RecordPayload};
pub use token::{AccessToken, OsTokenIssuer, TokenDigest, TokenIssuer, TOKEN_BYTES};
pub use types::{DoctorId, GrantId, PatientId, RecordId, Subject};
