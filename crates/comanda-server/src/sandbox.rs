//! Thin HTTP-facing wrapper around the core path sandbox, bound to the
//! server's configured data directory.

use std::path::PathBuf;

use comanda_core::ComandaError;

use crate::state::AppStateInner;

/// Validate `candidate` against the server's data directory.
pub fn resolve(state: &AppStateInner, candidate: &str) -> Result<PathBuf, ComandaError> {
    comanda_core::sandbox::validate_path(&state.data_dir, candidate)
}
