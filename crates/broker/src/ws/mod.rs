//! WebSocket gateway.
//!
//! `/ws/files` is served locally, backed by a [`notify`] watcher over the
//! workspace's host directory. `/ws/terminal`, `/ws/lsp`, and `/ws/tasks`
//! are proxied verbatim to the runner's own WebSocket terminators — the
//! broker never interprets PTY bytes, exec frames, or LSP frames itself.

mod files;
mod proxy;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/files/:id", get(files::watch))
        .route("/ws/terminal/:id", get(proxy::terminal))
        .route("/ws/lsp/:id", get(proxy::lsp))
        .route("/ws/tasks/:id", get(proxy::tasks))
        .with_state(state)
}
