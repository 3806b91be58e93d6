//! Session client against an in-process fake of the HTTP API.
//!
//! Each test binds its own axum server on an ephemeral port and counts the
//! requests it receives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{json, Value};

use sentinel_client::error::{StoreError, NETWORK_FAILURE};
use sentinel_client::storage::CredentialBackend;
use sentinel_client::{
    AuthState, ClientConfig, CredentialStore, FileBackend, LoginError, MemoryBackend,
    ProtectedError, SensorError, SessionClient,
};
use sentinel_common::credential::Credential;
use sentinel_common::models::SensorEvent;

type Hits = Arc<AtomicUsize>;

/// Serve `app` on 127.0.0.1 and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// HS256 token with the given role claim (none if `None`).
fn mint(role: Option<&str>) -> String {
    let mut claims = json!({ "sub": "tony", "exp": 4_102_444_800u64 });
    if let Some(role) = role {
        claims["role"] = json!(role);
    }
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap()
}

/// Base URL of a port that was just released, so connects are refused.
async fn refused_base() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn client(base_url: String, store: Arc<CredentialStore>) -> SessionClient {
    let config = ClientConfig {
        base_url,
        ..ClientConfig::default()
    };
    SessionClient::new(&config, store).unwrap()
}

/// `/token` that accepts only tony/stark and answers with `token`.
fn token_app(token: String, hits: Hits) -> Router {
    Router::new()
        .route(
            "/token",
            post(
                |State((token, hits)): State<(String, Hits)>,
                 Form(form): Form<HashMap<String, String>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let ok = form.get("grant_type").map(String::as_str) == Some("password")
                        && form.get("username").map(String::as_str) == Some("tony")
                        && form.get("password").map(String::as_str) == Some("stark");
                    if ok {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "access_token": token,
                                "token_type": "bearer",
                                "role": "operator",
                            })),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({ "detail": "Credenciales incorrectas" })),
                        )
                    }
                },
            ),
        )
        .with_state((token, hits))
}

/// Router answering every request on `path` with a fixed status and body.
fn fixed_app(path: &str, status: StatusCode, body: Value, hits: Hits) -> Router {
    let handler = move |State(hits): State<Hits>| {
        let body = body.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (status, Json(body))
        }
    };
    Router::new()
        .route(path, get(handler.clone()).post(handler))
        .with_state(hits)
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_persists_credential_and_reports_role() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let token = mint(Some("operator"));
    let hits = Hits::default();
    let base = serve(token_app(token.clone(), hits.clone())).await;

    let store = Arc::new(CredentialStore::open(FileBackend::new(&path)));
    let mut auth = store.subscribe();
    let client = client(base, store.clone());

    let outcome = client.login("tony", "stark").await.unwrap();
    assert_eq!(outcome.role, "operator");
    assert_eq!(outcome.reported_role.as_deref(), Some("operator"));
    assert_eq!(outcome.credential.as_str(), token);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert_eq!(
        client.auth_state(),
        AuthState::Authenticated {
            role: "operator".into()
        }
    );
    assert!(auth.has_changed().unwrap());
    assert!(auth.borrow_and_update().is_authenticated());

    // Survives a restart.
    let reopened = CredentialStore::open(FileBackend::new(&path));
    assert_eq!(
        reopened.credential().map(Credential::into_inner),
        Some(token)
    );
    assert_eq!(reopened.current_auth_state().role(), Some("operator"));
}

#[tokio::test]
async fn login_without_role_claim_reads_unknown() {
    let base = serve(token_app(mint(None), Hits::default())).await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let outcome = client.login("tony", "stark").await.unwrap();
    assert_eq!(outcome.role, "unknown");
    assert_eq!(outcome.reported_role.as_deref(), Some("operator"));
    assert_eq!(client.auth_state().role(), Some("unknown"));
}

#[tokio::test]
async fn login_rejection_shows_server_detail() {
    let base = serve(token_app(mint(Some("admin")), Hits::default())).await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client.login("tony", "wrong").await.unwrap_err();
    assert!(matches!(err, LoginError::Rejected { status: 401, .. }));
    assert_eq!(err.to_string(), "Credenciales incorrectas");
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
    assert!(client.store().credential().is_none());
}

#[tokio::test]
async fn login_validation_detail_is_flattened() {
    let hits = Hits::default();
    let body = json!({
        "detail": [{ "loc": ["body", "password"], "msg": "too short", "type": "value_error" }]
    });
    let base = serve(fixed_app("/token", StatusCode::UNAUTHORIZED, body, hits)).await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client.login("tony", "x").await.unwrap_err();
    assert!(matches!(err, LoginError::Validation { status: 401, .. }));
    assert_eq!(err.to_string(), "body -> password: too short");
    assert!(client.store().credential().is_none());
}

#[tokio::test]
async fn login_without_detail_uses_generic_message() {
    let base = serve(fixed_app(
        "/token",
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "boom" }),
        Hits::default(),
    ))
    .await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client.login("tony", "stark").await.unwrap_err();
    assert_eq!(err.to_string(), "invalid credentials or server error");
}

#[tokio::test]
async fn login_network_failure() {
    let client = client(refused_base().await, Arc::new(CredentialStore::in_memory()));
    let err = client.login("tony", "stark").await.unwrap_err();
    assert!(matches!(err, LoginError::Network(_)), "{err:?}");
    assert!(err.to_string().starts_with(NETWORK_FAILURE));
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn failed_login_purges_stale_malformed_credential() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let base = serve(token_app(mint(Some("admin")), Hits::default())).await;
    let store = Arc::new(CredentialStore::open(FileBackend::new(&path)));
    // Written behind the store's back, e.g. by a hand-edited file.
    FileBackend::new(&path).write("a.b.c").unwrap();
    let client = client(base, store.clone());

    client.login("tony", "wrong").await.unwrap_err();
    assert!(store.credential().is_none());
    assert_eq!(FileBackend::new(&path).read().unwrap(), None);
}

#[tokio::test]
async fn refused_malformed_credential_is_never_sent() {
    let hits = Hits::default();
    let base = serve(echo_auth_app(hits.clone())).await;
    let store = Arc::new(CredentialStore::open(MemoryBackend::with_value(mint(Some(
        "admin",
    )))));
    let client = client(base, store.clone());
    assert_eq!(client.auth_state().role(), Some("admin"));

    let err = store.save(Credential::new("a.b.c")).unwrap_err();
    assert!(matches!(err, StoreError::Undecodable(_)), "{err:?}");
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);

    let err = client
        .call_protected("/admin/only", reqwest::Method::GET)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtectedError::NoCredential), "{err:?}");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn undecodable_issued_credential_is_not_kept() {
    let base = serve(token_app("a.b.c".into(), Hits::default())).await;
    let store = Arc::new(CredentialStore::in_memory());
    let client = client(base, store.clone());

    let err = client.login("tony", "stark").await.unwrap_err();
    assert!(matches!(err, LoginError::InvalidCredential(_)), "{err:?}");
    assert!(store.credential().is_none());
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn malformed_token_response() {
    let base = serve(fixed_app(
        "/token",
        StatusCode::OK,
        json!({ "token": "missing access_token" }),
        Hits::default(),
    ))
    .await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client.login("tony", "stark").await.unwrap_err();
    assert!(matches!(err, LoginError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn logout_clears_persisted_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let base = serve(token_app(mint(Some("viewer")), Hits::default())).await;
    let client = client(
        base,
        Arc::new(CredentialStore::open(FileBackend::new(&path))),
    );

    client.login("tony", "stark").await.unwrap();
    assert!(path.exists());

    client.logout();
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
    let reopened = CredentialStore::open(FileBackend::new(&path));
    assert!(reopened.credential().is_none());
}

// ── Protected calls ─────────────────────────────────────────────────

fn echo_auth_app(hits: Hits) -> Router {
    Router::new()
        .route(
            "/admin/only",
            get(|State(hits): State<Hits>, headers: HeaderMap| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "ok": true, "auth": auth }))
            }),
        )
        .route(
            "/empty",
            post(|State(hits): State<Hits>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NO_CONTENT
            }),
        )
        .route("/plain", get(|| async { "not json" }))
        .with_state(hits)
}

#[tokio::test]
async fn protected_call_without_credential_sends_nothing() {
    let hits = Hits::default();
    let base = serve(echo_auth_app(hits.clone())).await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client
        .call_protected("/admin/only", reqwest::Method::GET)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtectedError::NoCredential));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn protected_call_carries_bearer_credential() {
    let hits = Hits::default();
    let base = serve(echo_auth_app(hits.clone())).await;
    let token = mint(Some("admin"));
    let store = Arc::new(CredentialStore::open(MemoryBackend::with_value(
        token.clone(),
    )));
    let client = client(base, store);

    let body = client
        .call_protected("/admin/only", reqwest::Method::GET)
        .await
        .unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["auth"], json!(format!("Bearer {token}")));

    let empty = client
        .call_protected("/empty", reqwest::Method::POST)
        .await
        .unwrap();
    assert_eq!(empty, Value::Null);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let err = client
        .call_protected("/plain", reqwest::Method::GET)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtectedError::MalformedBody(_)), "{err:?}");
}

#[tokio::test]
async fn protected_rejection_keeps_session() {
    let base = serve(fixed_app(
        "/admin/only",
        StatusCode::FORBIDDEN,
        json!({ "detail": "Acción no permitida" }),
        Hits::default(),
    ))
    .await;
    let store = Arc::new(CredentialStore::open(MemoryBackend::with_value(mint(Some(
        "viewer",
    )))));
    let client = client(base, store.clone());

    let err = client
        .call_protected("/admin/only", reqwest::Method::GET)
        .await
        .unwrap_err();
    match err {
        ProtectedError::Rejected { status, detail } => {
            assert_eq!(status, 403);
            assert_eq!(detail, "Acción no permitida");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(store.credential().is_some());
    assert_eq!(client.auth_state().role(), Some("viewer"));
}

#[tokio::test]
async fn protected_unauthorized_keeps_session() {
    let hits = Hits::default();
    let base = serve(fixed_app(
        "/admin/only",
        StatusCode::UNAUTHORIZED,
        json!({ "detail": "Token inválido" }),
        hits.clone(),
    ))
    .await;
    let token = mint(Some("operator"));
    let store = Arc::new(CredentialStore::open(MemoryBackend::with_value(
        token.clone(),
    )));
    let client = client(base, store.clone());

    let err = client
        .call_protected("/admin/only", reqwest::Method::GET)
        .await
        .unwrap_err();
    match &err {
        ProtectedError::Rejected { status, detail } => {
            assert_eq!(*status, 401);
            assert_eq!(detail, "Token inválido");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(store.credential().map(Credential::into_inner), Some(token));
    assert_eq!(client.auth_state().role(), Some("operator"));
}

#[tokio::test]
async fn protected_call_network_failure() {
    let store = Arc::new(CredentialStore::open(MemoryBackend::with_value(mint(Some(
        "admin",
    )))));
    let client = client(refused_base().await, store.clone());

    let err = client
        .call_protected("/admin/only", reqwest::Method::GET)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtectedError::Network(_)), "{err:?}");
    assert!(err.to_string().starts_with(NETWORK_FAILURE));
    assert!(store.credential().is_some());
}

// ── Sensor events ───────────────────────────────────────────────────

#[tokio::test]
async fn sensor_event_accepted() {
    let received: Arc<std::sync::Mutex<Option<Value>>> = Default::default();
    let app = Router::new()
        .route(
            "/sensor/event",
            post(
                |State(received): State<Arc<std::sync::Mutex<Option<Value>>>>,
                 Json(body): Json<Value>| async move {
                    *received.lock().unwrap() = Some(body);
                    (
                        StatusCode::ACCEPTED,
                        Json(json!({ "message": "Evento recibido", "sensor": "T-007" })),
                    )
                },
            ),
        )
        .with_state(received.clone());
    let base = serve(app).await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let event = SensorEvent::now("temperature", "T-007", "85");
    let accepted = client.submit_sensor_event(&event).await.unwrap();
    assert_eq!(accepted.message, "Evento recibido");
    assert_eq!(accepted.sensor.as_deref(), Some("T-007"));

    let body = received.lock().unwrap().clone().unwrap();
    assert_eq!(body["sensor_type"], json!("temperature"));
    assert_eq!(body["sensor_id"], json!("T-007"));
    assert_eq!(body["value"], json!("85"));
    assert!(body["timestamp"].as_f64().unwrap() > 1_600_000_000.0);
}

#[tokio::test]
async fn sensor_event_rejected() {
    let base = serve(fixed_app(
        "/sensor/event",
        StatusCode::BAD_REQUEST,
        json!({ "detail": "Valor inválido" }),
        Hits::default(),
    ))
    .await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client
        .submit_sensor_event(&SensorEvent::now("motion", "M-007", "-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::Rejected { status: 400, .. }));
    assert_eq!(err.to_string(), "HTTP 400: Valor inválido");
}

#[tokio::test]
async fn sensor_event_network_failure() {
    let client = client(refused_base().await, Arc::new(CredentialStore::in_memory()));

    let err = client
        .submit_sensor_event(&SensorEvent::now("temperature", "T-007", "85"))
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::Network(_)), "{err:?}");
    assert!(err.to_string().starts_with(NETWORK_FAILURE));
}

#[tokio::test]
async fn sensor_event_plain_200_is_not_accepted() {
    let base = serve(fixed_app(
        "/sensor/event",
        StatusCode::OK,
        json!({ "message": "ok" }),
        Hits::default(),
    ))
    .await;
    let client = client(base, Arc::new(CredentialStore::in_memory()));

    let err = client
        .submit_sensor_event(&SensorEvent::now("access", "A-007", "granted"))
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::Rejected { status: 200, .. }));
}
