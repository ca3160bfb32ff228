//! # Care Access Store
//!
//! Storage abstraction for grants and medical records. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`GrantStore`] trait,
//! allowing the access service to be storage-agnostic. [`MemoryStore`] keeps
//! one lock per patient; [`SqliteStore`] runs each operation in a single
//! immediate transaction.
//!
//! ## Key Types
//!
//! - [`GrantStore`] - The async trait for all storage operations
//! - [`GrantStoreExt`] - Issuance and lookup helpers built on the trait
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//! - [`CommitOutcome`] - Result of committing a record
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use careaccess_core::{DoctorId, OsTokenIssuer, PatientId};
//! use careaccess_store::{GrantStore, GrantStoreExt, IssueRequest, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("access.db").unwrap();
//!     let patient = PatientId::new("patient-1").unwrap();
//!     let doctor = DoctorId::new("doctor-1").unwrap();
//!     store.register_patient(&patient, 0).await.unwrap();
//!
//!     let request = IssueRequest::new(patient, doctor, Duration::from_secs(600));
//!     let issued = store.issue_grant(&OsTokenIssuer, request, 0).await.unwrap();
//!     println!("expires at {}", issued.grant.expires_at);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Digest only**: tokens are never stored, only their digests
//! - **Commit re-check**: a record is inserted only if its grant is still
//!   valid inside the insert's own atomic section

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CommitOutcome, GrantStore, GrantStoreExt, IssueRequest, IssuedGrant};
