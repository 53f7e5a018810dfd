//! `/ws/lsp/:workspace_id` — framed LSP Base Protocol bridge.
//!
//! Each complete JSON-RPC message from the language server's stdout
//! becomes one WebSocket *text* frame; each text frame from the client is
//! wrapped in `Content-Length` framing and written to the server's stdin.
//! Framing both directions reuses [`cloudide_core::lsp_framing`] so this
//! handler never re-implements the byte-counting itself. Stderr lines are
//! forwarded to the client as synthesized `window/logMessage`
//! notifications rather than discarded.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use cloudide_core::ids::container_name;
use cloudide_core::lsp_framing::{encode_message, FrameDecoder};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LspQuery {
    /// Language tag, resolved against a closed whitelist of LSP commands.
    pub language: String,
}

/// Closed whitelist of language tag → shell command run inside the
/// container. Unknown tags are rejected before anything is spawned.
fn lsp_command_for(language: &str) -> Option<&'static str> {
    match language {
        "python" => Some("pyright-langserver --stdio"),
        "node-ts" | "typescript" | "javascript" => Some("typescript-language-server --stdio"),
        "c" | "cpp" => Some("clangd"),
        "web" | "html" => Some("vscode-html-language-server --stdio"),
        _ => None,
    }
}

const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// `window/logMessage`'s `type` field for warning-level messages; LSP
/// stderr output has no severity of its own so it's forwarded as a
/// warning rather than invented as an error.
const LOG_MESSAGE_TYPE_WARNING: u8 = 2;

pub async fn handle(
    State(_state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    Query(query): Query<LspQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if cloudide_core::ids::assert_workspace_id(&workspace_id).is_err() {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    }
    let Some(command) = lsp_command_for(&query.language) else {
        let language = query.language.clone();
        return ws
            .on_upgrade(move |mut socket| async move {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_POLICY_VIOLATION,
                        reason: Cow::Owned(format!("unsupported language: {language}")),
                    })))
                    .await;
            })
            .into_response();
    };
    ws.on_upgrade(move |socket| bridge(socket, workspace_id, command))
}

fn log_message_notification(message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "window/logMessage",
        "params": { "type": LOG_MESSAGE_TYPE_WARNING, "message": message },
    })
    .to_string()
}

async fn bridge(mut socket: WebSocket, workspace_id: String, command: &'static str) {
    let name = container_name(&workspace_id);
    let mut child = match Command::new("docker")
        .args(["exec", "-i", &name, "sh", "-lc", command])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(error = %e, workspace_id, command, "failed to spawn language server");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let mut stdin = child.stdin.take().expect("stdin was piped");
    let mut stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut decoder = FrameDecoder::new();
    let mut read_buf = [0u8; 4096];
    let mut stderr_open = true;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if stdin.write_all(&encode_message(text.as_bytes())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if stdin.write_all(&encode_message(&bytes)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            read = stdout.read(&mut read_buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        decoder.push(&read_buf[..n]);
                        loop {
                            match decoder.next_message() {
                                Ok(Some(body)) => {
                                    let text = String::from_utf8_lossy(&body).to_string();
                                    if socket.send(Message::Text(text)).await.is_err() {
                                        let _ = child.kill().await;
                                        return;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    tracing::warn!(error = %e, workspace_id, "lsp framing error, dropping connection");
                                    let _ = socket.send(Message::Close(None)).await;
                                    let _ = child.kill().await;
                                    return;
                                }
                            }
                        }
                    }
                }
            }
            line = stderr_lines.next_line(), if stderr_open => {
                match line {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        let notification = log_message_notification(&line);
                        if socket.send(Message::Text(notification)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(_)) => {}
                    // stderr closed; keep bridging stdout/stdin until one of
                    // those ends the session instead of tearing the socket
                    // down on this alone.
                    Ok(None) | Err(_) => stderr_open = false,
                }
            }
        }
    }

    let _ = child.kill().await;
}
