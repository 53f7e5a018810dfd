//! Transparent proxy from a client-facing WebSocket to the runner's own
//! terminal/exec/LSP terminators.
//!
//! The broker does not parse PTY bytes, exec frames, or LSP Base Protocol
//! frames here — it only relays them, so the three protocols stay exactly
//! as the runner defines them. Frame parsing for LSP (see
//! `cloudide_core::lsp_framing`) happens once, inside the runner.

use axum::extract::ws::{CloseFrame, Message as AxumMessage, WebSocket};
use axum::extract::{Path, RawQuery, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use crate::state::AppState;

const SHARED_SECRET_HEADER: &str = "X-Runner-Secret";

pub async fn terminal(state: State<Arc<AppState>>, path: Path<String>, query: RawQuery, ws: WebSocketUpgrade) -> Response {
    proxy(state, path, query, ws, "pty").await
}

pub async fn lsp(state: State<Arc<AppState>>, path: Path<String>, query: RawQuery, ws: WebSocketUpgrade) -> Response {
    proxy(state, path, query, ws, "lsp").await
}

pub async fn tasks(state: State<Arc<AppState>>, path: Path<String>, query: RawQuery, ws: WebSocketUpgrade) -> Response {
    proxy(state, path, query, ws, "exec").await
}

async fn proxy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
    protocol: &'static str,
) -> Response {
    if cloudide_core::ids::assert_workspace_id(&id).is_err() {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    }

    let runner_ws_url = state
        .config
        .runner_base_url
        .replacen("http", "ws", 1);
    // Forward the client's query string (e.g. `/ws/lsp`'s `language=...`)
    // through to the runner's own terminator unchanged.
    let target = match query {
        Some(q) => format!("{runner_ws_url}/ws/{protocol}/{id}?{q}"),
        None => format!("{runner_ws_url}/ws/{protocol}/{id}"),
    };
    let shared_secret = state.config.runner_shared_secret.clone();

    ws.on_upgrade(move |socket| bridge(socket, target, shared_secret))
}

async fn bridge(client_socket: WebSocket, target_url: String, shared_secret: String) {
    let mut request = match target_url.into_client_request() {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "invalid runner websocket url");
            return;
        }
    };
    if let Ok(value) = HeaderValue::from_str(&shared_secret) {
        request.headers_mut().insert(SHARED_SECRET_HEADER, value);
    }

    let (runner_stream, _) = match tokio_tungstenite::connect_async(request).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "failed to connect to runner websocket");
            return;
        }
    };

    let (mut client_tx, mut client_rx) = client_socket.split();
    let (mut runner_tx, mut runner_rx) = runner_stream.split();

    let client_to_runner = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let forwarded = match msg {
                AxumMessage::Text(t) => TungsteniteMessage::Text(t),
                AxumMessage::Binary(b) => TungsteniteMessage::Binary(b),
                AxumMessage::Ping(p) => TungsteniteMessage::Ping(p),
                AxumMessage::Pong(p) => TungsteniteMessage::Pong(p),
                AxumMessage::Close(_) => break,
            };
            if runner_tx.send(forwarded).await.is_err() {
                break;
            }
        }
        let _ = runner_tx.close().await;
    };

    let runner_to_client = async {
        while let Some(Ok(msg)) = runner_rx.next().await {
            let forwarded = match msg {
                TungsteniteMessage::Text(t) => AxumMessage::Text(t),
                TungsteniteMessage::Binary(b) => AxumMessage::Binary(b),
                TungsteniteMessage::Ping(p) => AxumMessage::Ping(p),
                TungsteniteMessage::Pong(p) => AxumMessage::Pong(p),
                TungsteniteMessage::Close(frame) => {
                    let _ = client_tx
                        .send(AxumMessage::Close(frame.map(|f| CloseFrame {
                            code: f.code.into(),
                            reason: f.reason.to_string().into(),
                        })))
                        .await;
                    break;
                }
                TungsteniteMessage::Frame(_) => continue,
            };
            if client_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    tokio::join!(client_to_runner, runner_to_client);
}
