//! The three WebSocket protocols the runner terminates directly: an
//! interactive PTY-like shell, a one-shot streamed exec, and LSP Base
//! Protocol framing over `docker exec`.

mod exec;
mod lsp;
mod pty;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::auth;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/pty/:workspace_id", get(pty::handle))
        .route("/ws/exec/:workspace_id", get(exec::handle))
        .route("/ws/lsp/:workspace_id", get(lsp::handle))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_shared_secret))
        .with_state(state)
}
