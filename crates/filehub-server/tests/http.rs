#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tower::ServiceExt;

use filehub_core::config::QueueConfig;
use filehub_server::auth::AuthFlow;
use filehub_server::http::{AppState, build_router};
use filehub_server::jobs::{JobQueue, QueueName};
use filehub_server::session::SessionStore;
use filehub_server::storage::Store;

async fn state() -> AppState {
    let store = Store::open_in_memory().await;
    AppState {
        auth: AuthFlow::new(
            store.clone(),
            SessionStore::default(),
            Duration::from_secs(86_400),
        ),
        queue: JobQueue::new(store.clone(), QueueConfig::default()),
        store,
    }
}

/// Send a request to the app and return (status, JSON body or null).
async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for &(name, value) in headers {
        builder = builder.header(name, value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = build_router(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

async fn register_and_connect(state: &AppState) -> String {
    let (status, _) = send(
        state,
        "POST",
        "/users",
        &[],
        Some(json!({"email": "bob@dylan.com", "password": "toto1234!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let auth = basic("bob@dylan.com", "toto1234!");
    let (status, body) = send(state, "GET", "/connect", &[("authorization", &auth)], None).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn status_reports_both_stores() {
    let state = state().await;
    let (status, body) = send(&state, "GET", "/status", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"store_alive": true, "cache_alive": true}));

    state.store.close().await;
    let (_, body) = send(&state, "GET", "/status", &[], None).await;
    assert_eq!(body, json!({"store_alive": false, "cache_alive": true}));
}

#[tokio::test]
async fn stats_counts_and_outage() {
    let state = state().await;
    register_and_connect(&state).await;

    let (status, body) = send(&state, "GET", "/stats", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"users": 1, "files": 0}));

    state.store.close().await;
    let (status, body) = send(&state, "GET", "/stats", &[], None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn create_user_validates_and_enqueues() {
    let state = state().await;

    let (status, body) = send(&state, "POST", "/users", &[], Some(json!({"password": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing email"}));

    let (status, body) = send(&state, "POST", "/users", &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing email"}));

    let (status, body) = send(&state, "POST", "/users", &[], Some(json!({"email": "a@b.c"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing password"}));

    let payload = json!({"email": "a@b.c", "password": "pw"});
    let (status, body) = send(&state, "POST", "/users", &[], Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@b.c");
    assert!(body.get("password").is_none());

    let (status, body) = send(&state, "POST", "/users", &[], Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Already exist"}));

    assert_eq!(state.queue.counts(QueueName::User).await.unwrap().waiting, 1);
}

#[tokio::test]
async fn connect_me_disconnect() {
    let state = state().await;
    let token = register_and_connect(&state).await;

    let (status, body) = send(&state, "GET", "/users/me", &[("x-token", &token)], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "bob@dylan.com");
    assert!(body.get("password").is_none());

    let (status, _) = send(&state, "GET", "/disconnect", &[("x-token", &token)], None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&state, "GET", "/users/me", &[("x-token", &token)], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Unauthorized"}));
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let state = state().await;
    register_and_connect(&state).await;

    let wrong_pw = basic("bob@dylan.com", "nope");
    let unknown = basic("nobody@dylan.com", "toto1234!");
    let a = send(&state, "GET", "/connect", &[("authorization", &wrong_pw)], None).await;
    let b = send(&state, "GET", "/connect", &[("authorization", &unknown)], None).await;
    let c = send(&state, "GET", "/connect", &[], None).await;

    assert_eq!(a.0, StatusCode::UNAUTHORIZED);
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let state = state().await;
    let (status, _) = send(&state, "GET", "/users/me", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&state, "GET", "/disconnect", &[("x-token", "bogus")], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn closed_session_cache_is_503_not_401() {
    let state = state().await;
    let token = register_and_connect(&state).await;
    state.auth.sessions().cache().close().await;

    let (status, _) = send(&state, "GET", "/users/me", &[("x-token", &token)], None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
