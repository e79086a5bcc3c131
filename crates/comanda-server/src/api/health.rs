//! GET /health — liveness, no auth required.

use axum::{routing::get, Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "comanda",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
