//! `/ws/files/:id` — pushes file-change events for a workspace's directory.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct FileChangeEvent {
    path: String,
    kind: String,
}

pub async fn watch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if cloudide_core::ids::assert_workspace_id(&id).is_err() {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    }
    let root = state.workspace_root(&id);
    ws.on_upgrade(move |socket| handle_socket(socket, root))
}

async fn handle_socket(mut socket: WebSocket, root: std::path::PathBuf) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "failed to start file watcher");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
        tracing::warn!(error = %e, path = %root.display(), "failed to watch workspace directory");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(event) = rx.recv().await {
        let kind = format!("{:?}", event.kind);
        for path in event.paths {
            let rel = path.strip_prefix(&root).unwrap_or(&path).to_string_lossy().to_string();
            let payload = FileChangeEvent { path: rel, kind: kind.clone() };
            let Ok(json) = serde_json::to_string(&payload) else { continue };
            if socket.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
    }
}
