//! POST /process and POST /yaml/process — run a saved or inline workflow,
//! either streamed over SSE or collected into a single JSON response.

use axum::extract::{Query, State};
use axum::http::header::ACCEPT;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use comanda_core::workflow::{self, progress};
use comanda_core::ComandaError;

use crate::sandbox;
use crate::sse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/process",
            get(method_not_allowed)
                .put(method_not_allowed)
                .delete(method_not_allowed)
                .patch(method_not_allowed)
                .head(method_not_allowed)
                .post(process_named),
        )
        .route(
            "/yaml/process",
            get(method_not_allowed)
                .put(method_not_allowed)
                .delete(method_not_allowed)
                .patch(method_not_allowed)
                .head(method_not_allowed)
                .post(process_inline),
        )
}

async fn method_not_allowed() -> Response {
    ComandaError::method_not_allowed("only POST is allowed on this endpoint").into_response()
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ProcessQuery {
    filename: Option<String>,
    input: Option<String>,
    streaming: Option<bool>,
    #[serde(rename = "runtimeDir")]
    runtime_dir: Option<String>,
}

#[derive(Deserialize, Default)]
struct ProcessBody {
    #[serde(default)]
    input: Option<String>,
}

fn wants_streaming(query: &ProcessQuery, headers: &axum::http::HeaderMap) -> bool {
    if query.streaming == Some(true) {
        return true;
    }
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false)
}

async fn process_named(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ComandaError> {
    let filename = query
        .filename
        .clone()
        .ok_or_else(|| ComandaError::Validation("missing filename".to_string()))?;

    let path = state.data_dir.join(&filename);
    let yaml = std::fs::read_to_string(&path)
        .map_err(|e| ComandaError::not_found(format!("{}: {e}", path.display())))?;

    run_document(state, yaml, query, headers, body).await
}

async fn process_inline(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ComandaError> {
    let yaml = String::from_utf8(body.to_vec())
        .map_err(|e| ComandaError::Validation(format!("body is not valid UTF-8: {e}")))?;

    let runtime_root = match &query.runtime_dir {
        Some(dir) => sandbox::resolve(&state, dir)?,
        None => state.data_dir.clone(),
    };

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| ComandaError::Internal(e.to_string()))?
        .as_nanos();
    let script_name = format!("script_{nanos}.yaml");
    std::fs::create_dir_all(&runtime_root).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    std::fs::write(runtime_root.join(&script_name), &yaml).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;

    run_document(state, yaml, query, headers, axum::body::Bytes::new()).await
}

async fn run_document(
    state: AppState,
    yaml: String,
    query: ProcessQuery,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ComandaError> {
    let document = workflow::parse(&yaml)?;

    let provided_input = query.input.clone().or_else(|| {
        if body.is_empty() {
            None
        } else {
            serde_json::from_slice::<ProcessBody>(&body).ok().and_then(|b| b.input)
        }
    });

    let requires_stdin = document
        .values()
        .any(|step| step.input.items().iter().any(|i| i == comanda_core::workflow::schema::STDIN));
    if requires_stdin && provided_input.is_none() {
        return Err(ComandaError::Validation(
            "POST request requires 'input' query parameter or JSON body with 'input' field".to_string(),
        ));
    }

    let runtime_dir = match &query.runtime_dir {
        Some(dir) => sandbox::resolve(&state, dir)?,
        None => state.data_dir.clone(),
    };

    let config = state.config.read().await.clone();
    let server_settings = config.server.clone();
    let verbose = false;

    let mut engine = workflow::new_engine(document, config, server_settings, verbose, Some(runtime_dir));
    if let Some(input) = provided_input {
        engine.set_last_output(input);
    }

    if wants_streaming(&query, &headers) {
        let (tx, rx) = progress::channel(64);
        engine.set_progress_writer(tx);
        Ok(sse::run_streaming(engine, rx).into_response())
    } else {
        engine.run().await?;
        Ok(Json(serde_json::json!({
            "success": true,
            "output": engine.last_output(),
        }))
        .into_response())
    }
}
