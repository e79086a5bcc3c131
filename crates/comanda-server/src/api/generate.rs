//! POST /generate — thin stub for LLM-authored workflow generation.
//!
//! Full prompt-to-YAML synthesis is out of scope; this endpoint only
//! validates the request shape and echoes a minimal single-step skeleton
//! the caller can expand by hand.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use comanda_core::ComandaError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

#[derive(Deserialize)]
struct GenerateBody {
    prompt: String,
}

async fn generate(
    State(_state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    if body.prompt.trim().is_empty() {
        return Err(ComandaError::Validation("prompt must not be empty".to_string()));
    }
    let skeleton = format!(
        "step:\n  input: STDIN\n  model: NA\n  action: \"{}\"\n  output: STDOUT\n",
        body.prompt.replace('"', "\\\"")
    );
    Ok(Json(serde_json::json!({ "yaml": skeleton })))
}
