//! Thin axum surface over the auth flow, producers and liveness checks.

pub mod error;
pub mod routes;

pub use error::ApiError;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::auth::AuthFlow;
use crate::jobs::JobQueue;
use crate::storage::Store;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub auth: AuthFlow,
    pub queue: JobQueue,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(routes::status))
        .route("/stats", get(routes::stats))
        .route("/users", post(routes::create_user))
        .route("/users/me", get(routes::me))
        .route("/connect", get(routes::connect))
        .route("/disconnect", get(routes::disconnect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
