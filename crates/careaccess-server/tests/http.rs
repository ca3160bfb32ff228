//! HTTP-level tests driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use careaccess::{AccessPolicy, AccessService, GrantStore, MemoryStore};
use careaccess_core::{Clock, ManualClock};
use careaccess_server::{build_router, AppState, Claims, IdentityVerifier, JwtVerifier};

const SECRET: &[u8] = b"http-test-secret";

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn app() -> TestApp {
    let store: Arc<dyn GrantStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::default());
    let service = Arc::new(AccessService::new(store, clock.clone(), AccessPolicy::default()));
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(SECRET, None, None));

    TestApp {
        router: build_router(AppState { service }, verifier),
        clock,
    }
}

fn jwt(sub: &str) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    let claims = Claims {
        sub: sub.to_string(),
        exp,
        iss: None,
        aud: None,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    caller: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        req = req.header("authorization", format!("Bearer {}", jwt(caller)));
    }
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &TestApp, patient: &str, doctor: &str) {
    let (status, _) = call(&app.router, Method::PUT, "/patients/me", Some(patient), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app.router, Method::PUT, "/doctors/me", Some(doctor), None).await;
    assert_eq!(status, StatusCode::OK);
}

async fn issue(app: &TestApp, patient: &str, doctor: &str) -> String {
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/access-grants",
        Some(patient),
        Some(json!({ "doctorId": doctor })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["accessToken"].as_str().unwrap().to_string()
}

fn record_body(patient: &str, token: &str) -> Value {
    json!({
        "userId": patient,
        "accessToken": token,
        "diagnosis": "influenza",
        "symptoms": ["fever"],
        "prescriptions": ["rest"],
        "notes": "review in a week"
    })
}

#[tokio::test]
async fn health_needs_no_identity() {
    let app = app();
    let (status, body) = call(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn missing_or_bad_credentials_are_unauthenticated() {
    let app = app();
    let (status, body) = call(&app.router, Method::GET, "/access-grants", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let req = Request::builder()
        .uri("/access-grants")
        .header("authorization", "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn grant_write_revoke_flow() {
    let app = app();
    register(&app, "patient-p", "doctor-d").await;

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/access-grants",
        Some("patient-p"),
        Some(json!({ "doctorId": "doctor-d" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["accessToken"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert_eq!(body["expiresAt"], json!(app.clock.now_millis() + 600_000));

    let (status, record) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("doctor-d"),
        Some(record_body("patient-p", &token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{record}");
    assert_eq!(record["doctorId"], "doctor-d");
    assert_eq!(record["patientId"], "patient-p");
    assert_eq!(record["diagnosis"], "influenza");

    let (status, body) = call(
        &app.router,
        Method::DELETE,
        "/access-grants/doctor-d",
        Some("patient-p"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "revoked": 1 }));

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("doctor-d"),
        Some(record_body("patient-p", &token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PERMISSION_DENIED");
    assert_eq!(body["message"], "invalid or expired access token");

    let (status, records) =
        call(&app.router, Method::GET, "/medical-records", Some("patient-p"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records.as_array().unwrap().len(), 1);

    let (status, grants) =
        call(&app.router, Method::GET, "/access-grants", Some("patient-p"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grants[0]["status"], "revoked");
    assert!(grants[0].get("tokenDigest").is_none());
}

#[tokio::test]
async fn denials_look_identical() {
    let app = app();
    register(&app, "alice", "bob").await;
    let (_, _) = call(&app.router, Method::PUT, "/doctors/me", Some("carol"), None).await;

    let revoked = issue(&app, "alice", "bob").await;
    call(&app.router, Method::DELETE, "/access-grants/bob", Some("alice"), None).await;
    let (revoked_status, revoked_body) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("bob"),
        Some(record_body("alice", &revoked)),
    )
    .await;

    let expired = issue(&app, "alice", "carol").await;
    app.clock.advance(Duration::from_secs(601));
    let (expired_status, expired_body) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("carol"),
        Some(record_body("alice", &expired)),
    )
    .await;

    let (forged_status, forged_body) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("carol"),
        Some(record_body("alice", &"f".repeat(64))),
    )
    .await;

    for status in [revoked_status, expired_status, forged_status] {
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    assert_eq!(revoked_body, expired_body);
    assert_eq!(expired_body, forged_body);
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let app = app();
    register(&app, "alice", "bob").await;

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/access-grants",
        Some("alice"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let token = issue(&app, "alice", "bob").await;
    let (status, _) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("bob"),
        Some(json!({ "userId": "alice", "accessToken": token })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("bob"),
        Some(json!({ "accessToken": token, "diagnosis": "flu" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/access-grants")
        .header("authorization", format!("Bearer {}", jwt("alice")))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (status, records) =
        call(&app.router, Method::GET, "/medical-records", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(records.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_subjects_are_not_found() {
    let app = app();
    register(&app, "alice", "bob").await;
    let token = issue(&app, "alice", "bob").await;

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/medical-records",
        Some("bob"),
        Some(record_body("nobody", &token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = call(
        &app.router,
        Method::DELETE,
        "/access-grants/bob",
        Some("stranger"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoke_twice_succeeds() {
    let app = app();
    register(&app, "alice", "bob").await;
    issue(&app, "alice", "bob").await;

    for expected in [1, 0] {
        let (status, body) =
            call(&app.router, Method::DELETE, "/access-grants/bob", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "revoked": expected }));
    }
}
