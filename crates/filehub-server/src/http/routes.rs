use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::producers::register_user;

use super::AppState;
use super::error::ApiError;

/// Header carrying the session token on authenticated requests.
pub const TOKEN_HEADER: &str = "x-token";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "store_alive": state.store.is_alive(),
        "cache_alive": state.auth.sessions().is_alive(),
    }))
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = state.store.nb_users().await?;
    let files = state.store.nb_files().await?;
    Ok(Json(json!({ "users": users, "files": files })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUser {
    email: Option<String>,
    password: Option<String>,
}

/// `POST /users`
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // An unreadable body is treated like an empty one.
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let user = register_user(
        &state.store,
        &state.queue,
        body.email.as_deref(),
        body.password.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "email": user.email })),
    ))
}

/// `GET /connect`
pub async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = state
        .auth
        .sign_in(header_str(&headers, header::AUTHORIZATION.as_str()))
        .await?;
    Ok(Json(json!({ "token": token })))
}

/// `GET /disconnect`
pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.auth.sign_out(header_str(&headers, TOKEN_HEADER)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/me`
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = state
        .auth
        .current_user(header_str(&headers, TOKEN_HEADER))
        .await?;
    let user = state
        .store
        .users()?
        .find_by_id(&user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({ "id": user.id, "email": user.email })))
}
