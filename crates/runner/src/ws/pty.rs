//! `/ws/pty/:workspace_id` — an interactive shell session.
//!
//! Allocates a real pseudoterminal with `portable_pty` and runs
//! `docker exec -it <container> bash -lc 'cd /workspace && exec bash'`
//! attached to its slave side. Unlike a plain piped `docker exec`, this
//! gives the child an actual tty, so resize frames translate into a real
//! `TIOCSWINSZ` on the master instead of being dropped on the floor.
//!
//! Frame protocol (JSON text frames):
//! - client → server: `{type:"input", data}` | `{type:"resize", cols, rows}`
//! - server → client: `{type:"output", data}`

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use cloudide_core::ids::container_name;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Output { data: String },
}

pub async fn handle(State(state): State<Arc<AppState>>, Path(workspace_id): Path<String>, ws: WebSocketUpgrade) -> Response {
    let _ = &state;
    if cloudide_core::ids::assert_workspace_id(&workspace_id).is_err() {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    }
    ws.on_upgrade(move |socket| bridge(socket, workspace_id))
}

async fn bridge(mut socket: WebSocket, workspace_id: String) {
    let name = container_name(&workspace_id);
    let pty_system = native_pty_system();
    let pair = match pty_system.openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 }) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, workspace_id, "failed to allocate pty");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let mut cmd = CommandBuilder::new("docker");
    cmd.args(["exec", "-it", &name, "bash", "-lc", "cd /workspace && exec bash"]);

    let mut child = match pair.slave.spawn_command(cmd) {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(error = %e, workspace_id, "failed to spawn pty shell");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    // The slave fd is only needed by the spawned child; drop our copy so
    // the master sees EOF once the shell exits.
    drop(pair.slave);

    let master = pair.master;
    let mut writer = match master.take_writer() {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, workspace_id, "failed to take pty writer");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let reader = match master.try_clone_reader() {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, workspace_id, "failed to clone pty reader");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(64);
    let _reader_task = tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) if out_tx.blocking_send(buf[..n].to_vec()).is_err() => break,
                Ok(_) => {}
            }
        }
    });

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Input { data }) => {
                                if writer.write_all(data.as_bytes()).is_err() {
                                    break;
                                }
                            }
                            Ok(ClientFrame::Resize { cols, rows }) => {
                                let _ = master.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 });
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, workspace_id, "ignoring malformed pty frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            chunk = out_rx.recv() => {
                match chunk {
                    Some(bytes) => {
                        let frame = ServerFrame::Output { data: String::from_utf8_lossy(&bytes).to_string() };
                        if let Ok(json) = serde_json::to_string(&frame) {
                            if socket.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = child.kill();
    let _ = socket.send(Message::Close(None)).await;
}
