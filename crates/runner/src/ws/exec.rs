//! `/ws/exec/:workspace_id` — streamed command execution.
//!
//! The client sends `{type:"run", cmd, cwd?, env?}` frames; each spawns
//! `docker exec -i` and streams stdout/stderr chunks as tagged text frames,
//! followed by a final `{type:"exit", code}` frame. Multiple `run` frames
//! may be issued sequentially on one socket — the handler does not read
//! the next frame until the previous run's exit frame has been sent, which
//! serialises concurrent attempts rather than interleaving their streams.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use cloudide_core::ids::container_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Run {
        cmd: String,
        cwd: Option<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ExecFrame {
    Stdout { data: String },
    Stderr { data: String },
    Exit { code: i32 },
    Error { message: String },
}

pub async fn handle(State(state): State<Arc<AppState>>, Path(workspace_id): Path<String>, ws: WebSocketUpgrade) -> Response {
    let _ = &state;
    if cloudide_core::ids::assert_workspace_id(&workspace_id).is_err() {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    }
    ws.on_upgrade(move |socket| run(socket, workspace_id))
}

async fn run(mut socket: WebSocket, workspace_id: String) {
    loop {
        let payload = match socket.recv().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(_)) => break,
            _ => continue,
        };

        let request: ClientFrame = match serde_json::from_str(&payload) {
            Ok(req) => req,
            Err(e) => {
                send_frame(&mut socket, ExecFrame::Error { message: e.to_string() }).await;
                continue;
            }
        };
        let ClientFrame::Run { cmd, cwd, env } = request;
        if cmd.trim().is_empty() {
            send_frame(&mut socket, ExecFrame::Error { message: "cmd must not be empty".to_string() }).await;
            continue;
        }

        let name = container_name(&workspace_id);
        let mut args = vec!["exec".to_string(), "-i".to_string()];
        for (key, value) in &env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        if let Some(cwd) = &cwd {
            args.push("-w".to_string());
            args.push(cwd.clone());
        }
        args.push(name);
        args.extend(["sh".to_string(), "-lc".to_string(), cmd]);

        let mut child = match Command::new("docker")
            .args(&args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                send_frame(&mut socket, ExecFrame::Error { message: e.to_string() }).await;
                continue;
            }
        };

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let mut out_buf = [0u8; 4096];
        let mut err_buf = [0u8; 4096];
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if stdout_open => {
                    match read {
                        Ok(0) | Err(_) => stdout_open = false,
                        Ok(n) => {
                            let data = String::from_utf8_lossy(&out_buf[..n]).to_string();
                            send_frame(&mut socket, ExecFrame::Stdout { data }).await;
                        }
                    }
                }
                read = stderr.read(&mut err_buf), if stderr_open => {
                    match read {
                        Ok(0) | Err(_) => stderr_open = false,
                        Ok(n) => {
                            let data = String::from_utf8_lossy(&err_buf[..n]).to_string();
                            send_frame(&mut socket, ExecFrame::Stderr { data }).await;
                        }
                    }
                }
            }
        }

        let code = child.wait().await.ok().and_then(|s| s.code()).unwrap_or(-1);
        send_frame(&mut socket, ExecFrame::Exit { code }).await;
    }

    let _ = socket.send(Message::Close(None)).await;
}

async fn send_frame(socket: &mut WebSocket, frame: ExecFrame) {
    if let Ok(json) = serde_json::to_string(&frame) {
        let _ = socket.send(Message::Text(json)).await;
    }
}
