//! # Care Access Server
//!
//! HTTP surface for delegated record access.
//!
//! | Method & path | Caller | Effect |
//! |---|---|---|
//! | `PUT /patients/me` | any | register the caller as a patient |
//! | `PUT /doctors/me` | any | register the caller as a doctor |
//! | `POST /access-grants` | patient | issue a grant, returns `{accessToken, expiresAt}` |
//! | `GET /access-grants` | patient | list own grants with status |
//! | `DELETE /access-grants/{doctorId}` | patient | revoke, returns `{revoked: N}` |
//! | `POST /medical-records` | doctor | append a record with a token |
//! | `GET /medical-records` | patient | list own records |
//! | `GET /health` | none | liveness |
//!
//! Errors render as `{"code": "...", "message": "..."}`.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod sweeper;

pub use config::ServerConfig;
pub use error::ApiError;
pub use identity::{Claims, IdentityVerifier, JwtVerifier};
pub use routes::{build_router, AppState};
pub use sweeper::spawn_sweeper;
