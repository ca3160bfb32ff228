//! HTTP routes.
//!
//! Everything except `/health` requires a verified caller.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{middleware, Extension, Json, Router};
use careaccess::{AccessService, GrantStore, GrantSummary, MedicalRecord};
use careaccess_core::{AccessToken, DoctorId, PatientId, RecordPayload, Subject};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::identity::{require_identity, IdentityVerifier};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AccessService<dyn GrantStore>>,
}

/// Build the application router.
pub fn build_router(state: AppState, verifier: Arc<dyn IdentityVerifier>) -> Router {
    let protected = Router::new()
        .route("/access-grants", post(issue_grant).get(list_grants))
        .route("/access-grants/{doctor_id}", delete(revoke_grants))
        .route("/medical-records", post(append_record).get(list_records))
        .route("/patients/me", put(register_patient))
        .route("/doctors/me", put(register_doctor))
        .route_layer(middleware::from_fn_with_state(verifier, require_identity));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Registration {
    subject: String,
    created: bool,
}

async fn register_patient(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
) -> Result<Json<Registration>, ApiError> {
    let created = state.service.register_patient(&caller).await?;
    Ok(Json(Registration {
        subject: caller.to_string(),
        created,
    }))
}

async fn register_doctor(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
) -> Result<Json<Registration>, ApiError> {
    let created = state.service.register_doctor(&caller).await?;
    Ok(Json(Registration {
        subject: caller.to_string(),
        created,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Grants
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueGrantRequest {
    doctor_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueGrantResponse {
    access_token: String,
    /// Unix ms, exclusive.
    expires_at: i64,
}

async fn issue_grant(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
    payload: Result<Json<IssueGrantRequest>, JsonRejection>,
) -> Result<Json<IssueGrantResponse>, ApiError> {
    let request = body(payload)?;
    let doctor = DoctorId::new(required(request.doctor_id, "doctorId")?)?;

    let issued = state.service.issue_grant(&caller, &doctor).await?;
    Ok(Json(IssueGrantResponse {
        access_token: issued.token.expose_secret().to_string(),
        expires_at: issued.grant.expires_at,
    }))
}

async fn list_grants(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
) -> Result<Json<Vec<GrantSummary>>, ApiError> {
    Ok(Json(state.service.list_grants(&caller).await?))
}

async fn revoke_grants(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let doctor = DoctorId::new(doctor_id)?;
    let revoked = state.service.revoke(&caller, &doctor).await?;
    Ok(Json(json!({ "revoked": revoked })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendRecordRequest {
    user_id: Option<String>,
    access_token: Option<String>,
    diagnosis: Option<String>,
    #[serde(default)]
    symptoms: Vec<String>,
    #[serde(default)]
    prescriptions: Vec<String>,
    notes: Option<String>,
}

async fn append_record(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
    payload: Result<Json<AppendRecordRequest>, JsonRejection>,
) -> Result<Json<MedicalRecord>, ApiError> {
    let request = body(payload)?;
    let patient = PatientId::new(required(request.user_id, "userId")?)?;
    let token = AccessToken::from_presented(required(request.access_token, "accessToken")?)?;
    let payload = RecordPayload {
        diagnosis: required(request.diagnosis, "diagnosis")?,
        symptoms: request.symptoms,
        prescriptions: request.prescriptions,
        notes: request.notes,
    };

    let record = state
        .service
        .append_record(&caller, &patient, &token, payload)
        .await?;
    Ok(Json(record))
}

async fn list_records(
    State(state): State<AppState>,
    Extension(caller): Extension<Subject>,
) -> Result<Json<Vec<MedicalRecord>>, ApiError> {
    Ok(Json(state.service.list_records(&caller).await?))
}
