//! API module
//!
//! Contains the HTTP request handlers and the API router. Static asset routes
//! and middleware layers are added in `main.rs`.

pub mod chat;

use crate::state::SharedState;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

/// Liveness response body
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// API routes shared between the binary and the integration tests
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/get", post(chat::chat))
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
