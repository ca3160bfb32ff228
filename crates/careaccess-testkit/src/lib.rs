//! # Care Access Testkit
//!
//! Testing utilities for the care access crates.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a store, a [`ManualClock`](careaccess_core::ManualClock)
//!   and an `AccessService` wired together
//! - **Generators**: Proptest strategies for identifiers and record payloads
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use careaccess_testkit::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let patient = fixture.patient("alice").await.unwrap();
//!     let doctor = fixture.doctor("bob").await.unwrap();
//!     let token = fixture.grant(&patient, &doctor).await.unwrap();
//!
//!     // Ten minutes later the token no longer authorizes anything.
//!     fixture.advance(Duration::from_secs(600));
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use careaccess_testkit::generators::record_payload;
//!
//! proptest! {
//!     #[test]
//!     fn payloads_validate(payload in record_payload()) {
//!         prop_assert!(payload.validate().is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{doctors, TestFixture};
pub use generators::{distinct_doctors, doctor_id, patient_id, record_payload, subject_id};
