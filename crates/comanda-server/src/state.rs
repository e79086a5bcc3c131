//! Shared application state handed to every axum handler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use comanda_core::Config;

#[derive(Clone)]
pub struct AppState(pub Arc<AppStateInner>);

pub struct AppStateInner {
    pub config: RwLock<Config>,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        let data_dir = PathBuf::from(&config.server.data_dir);
        Self(Arc::new(AppStateInner {
            config: RwLock::new(config),
            config_path,
            data_dir,
        }))
    }
}

impl std::ops::Deref for AppState {
    type Target = AppStateInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl axum::extract::FromRef<AppState> for AppState {
    fn from_ref(state: &AppState) -> Self {
        state.clone()
    }
}
