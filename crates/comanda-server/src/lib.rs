//! Comanda HTTP execution layer — an axum adapter exposing the workflow
//! engine, config store, and sandboxed file store over a streaming HTTP
//! API.

pub mod api;
pub mod auth;
pub mod sandbox;
pub mod sse;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use comanda_core::Config;

use self::state::AppState;

/// Configuration for the Comanda HTTP server, separate from [`Config`]
/// (the workflow/provider config store) — this is just bind address and
/// where the config file lives on disk.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub config_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            config_path: Config::default_path(),
            config_password: None,
        }
    }
}

/// Load the config store and wrap it in a shared [`AppState`].
pub fn create_app_state(config_path: PathBuf, password: Option<&str>) -> Result<AppState, String> {
    let config = Config::load(&config_path, password).map_err(|e| e.to_string())?;
    Ok(AppState::new(config, config_path))
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .merge(api::files::router())
        .merge(api::process::router())
        .merge(api::providers::router())
        .merge(api::env::router())
        .merge(api::generate::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .merge(api::health::router())
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server, binding to `config.host:config.port`. Returns the
/// address actually bound (useful when `port` is 0 for ephemeral binding in
/// tests).
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comanda_server=info,tower_http=info".into()),
        )
        .try_init()
        .ok();

    let state = create_app_state(config.config_path.clone(), config.config_password.as_deref())?;
    start_server_with_state(config, state).await
}

pub async fn start_server_with_state(config: ServerConfig, state: AppState) -> Result<SocketAddr, String> {
    let app = app_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid address: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind to {addr}: {e}"))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("failed to read local address: {e}"))?;

    tracing::info!("comanda server listening on {local_addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("server error: {e}");
        }
    });

    Ok(local_addr)
}
