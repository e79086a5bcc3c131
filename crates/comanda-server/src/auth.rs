//! Bearer-token auth middleware. A no-op when the server's `enabled` flag
//! is false; otherwise the `Authorization` header must carry
//! `Bearer <token>` matching the configured token exactly.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use comanda_core::ComandaError;

use crate::state::AppState;

pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = state.config.read().await;
    if !config.server.enabled {
        drop(config);
        return next.run(request).await;
    }
    let expected = config.server.bearer_token.clone();
    drop(config);

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected && !expected.is_empty() => next.run(request).await,
        _ => {
            use axum::response::IntoResponse;
            ComandaError::Authz("missing or invalid bearer token".to_string()).into_response()
        }
    }
}
