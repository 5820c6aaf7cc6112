//! HTTP server for the herald.
//!
//! Inbound HTTP surface:
//!
//! - `GET /health` - Returns 200 if the process is running
//! - `GET /state/{domain}` - Returns the domain's persisted record as JSON
//! - `POST /command/{domain}` - Handles one command message, returns the reply

use std::path::PathBuf;
use std::sync::Arc;

pub mod command;
pub mod health;
pub mod state;

pub use command::{CommandState, command_routes};
pub use health::health_handler;
pub use state::state_handler;

/// Shared application state, passed to handlers via Axum's `State`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Directory holding the per-domain state records.
    state_dir: PathBuf,
}

impl AppState {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                state_dir: state_dir.into(),
            }),
        }
    }

    /// Returns the state directory path.
    pub fn state_dir(&self) -> &PathBuf {
        &self.inner.state_dir
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/state/{domain}", get(state_handler))
        .with_state(app_state)
}
