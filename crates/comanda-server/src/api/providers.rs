//! Provider registry admin endpoints — list, validate, upsert, and remove
//! provider entries in the live config.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use comanda_core::config::ProviderEntry;
use comanda_core::ComandaError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/providers",
            get(list_providers)
                .put(upsert_provider)
                .post(method_not_allowed)
                .delete(method_not_allowed)
                .patch(method_not_allowed)
                .head(method_not_allowed),
        )
        .route("/providers/validate", post(validate_provider))
        .route("/providers/{name}", axum::routing::delete(delete_provider))
}

async fn method_not_allowed() -> Response {
    ComandaError::method_not_allowed("only GET/PUT are allowed on this endpoint").into_response()
}

#[derive(Serialize)]
struct ProviderSummary {
    name: String,
    enabled: bool,
    models: Vec<String>,
}

async fn list_providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config.read().await;
    let providers: Vec<ProviderSummary> = config
        .providers
        .iter()
        .map(|(name, entry)| ProviderSummary {
            name: name.clone(),
            enabled: !entry.api_key.is_empty(),
            models: entry.models.iter().map(|m| m.name.clone()).collect(),
        })
        .collect();
    Json(serde_json::json!({ "providers": providers }))
}

#[derive(Deserialize)]
struct UpsertBody {
    name: String,
    #[serde(flatten)]
    entry: ProviderEntry,
}

async fn upsert_provider(
    State(state): State<AppState>,
    Json(body): Json<UpsertBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let mut config = state.config.write().await;
    config.providers.insert(body.name.clone(), body.entry);
    config
        .save(&state.config_path)
        .map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "name": body.name })))
}

async fn delete_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    if name.is_empty() {
        return Err(ComandaError::Validation("missing provider name".to_string()));
    }
    let mut config = state.config.write().await;
    if config.providers.remove(&name).is_none() {
        return Err(ComandaError::not_found(format!("provider '{name}' not configured")));
    }
    config
        .save(&state.config_path)
        .map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "name": name })))
}

#[derive(Deserialize)]
struct ValidateBody {
    name: String,
}

async fn validate_provider(
    State(state): State<AppState>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let config = state.config.read().await;
    let entry = config
        .providers
        .get(&body.name)
        .ok_or_else(|| ComandaError::not_found(format!("provider '{}' not configured", body.name)))?;
    Ok(Json(serde_json::json!({
        "name": body.name,
        "valid": !entry.api_key.is_empty(),
    })))
}
