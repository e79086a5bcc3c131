//! Core error type for the comanda platform.
//!
//! `ComandaError` is used throughout the core domain (config store, provider
//! registry, input resolver, database handler, workflow engine). When the
//! `axum` feature is enabled, it also implements `IntoResponse` so it can be
//! used directly as an axum handler error type by `comanda-server`.

#[derive(Debug, thiserror::Error)]
pub enum ComandaError {
    #[error("config error: {0}")]
    ConfigIo(String),

    #[error("config encryption error: {0}")]
    ConfigEncryption(String),

    #[error("unauthorized: {0}")]
    Authz(String),

    #[error("sandbox violation: {0}")]
    Sandbox(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ComandaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::MethodNotAllowed(msg.into())
    }
}

impl From<std::io::Error> for ComandaError {
    fn from(e: std::io::Error) -> Self {
        ComandaError::ConfigIo(e.to_string())
    }
}

impl From<serde_yaml::Error> for ComandaError {
    fn from(e: serde_yaml::Error) -> Self {
        ComandaError::ConfigIo(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ComandaError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ComandaError::ConfigIo(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ComandaError::ConfigEncryption(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ComandaError::Authz(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ComandaError::Sandbox(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ComandaError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ComandaError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ComandaError::MethodNotAllowed(msg) => (StatusCode::METHOD_NOT_ALLOWED, msg.clone()),
            ComandaError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ComandaError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ComandaError::Cancelled(msg) => (StatusCode::REQUEST_TIMEOUT, msg.clone()),
            ComandaError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}
