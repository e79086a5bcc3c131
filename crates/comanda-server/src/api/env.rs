//! POST /env/encrypt and POST /env/decrypt — expose the config store's
//! AES-256-GCM envelope to clients that manage secrets out of band.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use comanda_core::config;
use comanda_core::ComandaError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/env/encrypt", post(encrypt))
        .route("/env/decrypt", post(decrypt))
}

#[derive(Deserialize)]
struct EnvBody {
    value: String,
    password: String,
}

async fn encrypt(
    State(_state): State<AppState>,
    Json(body): Json<EnvBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let encrypted = config::encrypt(&body.value, &body.password)
        .map_err(|e| ComandaError::ConfigEncryption(e.to_string()))?;
    Ok(Json(serde_json::json!({ "value": encrypted })))
}

async fn decrypt(
    State(_state): State<AppState>,
    Json(body): Json<EnvBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let decrypted = config::decrypt(&body.value, &body.password)
        .map_err(|e| ComandaError::ConfigEncryption(e.to_string()))?;
    Ok(Json(serde_json::json!({ "value": decrypted })))
}
