//! `ALL /preview/:workspace_id/:port[/suffix]` — reverse proxy into a
//! workspace's exposed HTTP port.
//!
//! The container port is published to an ephemeral host port at start
//! time (`docker run -P`); this handler resolves that mapping on every
//! request rather than caching it, since a container can be restarted
//! (and re-mapped) without the runner's in-memory state noticing.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use cloudide_core::ids::assert_workspace_id;
use std::sync::Arc;

use crate::state::AppState;

pub async fn forward(
    State(state): State<Arc<AppState>>,
    Path(params): Path<std::collections::HashMap<String, String>>,
    req: Request<Body>,
) -> Response {
    let Some(workspace_id) = params.get("workspace_id") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(port_str) = params.get("port") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if assert_workspace_id(workspace_id).is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Ok(container_port) = port_str.parse::<u16>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let host_port = match state.supervisor.published_port(workspace_id, container_port).await {
        Ok(Some(port)) => port,
        Ok(None) => return (StatusCode::BAD_GATEWAY, "port is not published").into_response(),
        Err(e) => return (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    };

    let suffix = params.get("suffix").map(String::as_str).unwrap_or("");
    let query = req.uri().query().map(|q| format!("?{q}")).unwrap_or_default();
    let target_uri: Uri = match format!("http://127.0.0.1:{host_port}/{suffix}{query}").parse() {
        Ok(uri) => uri,
        Err(_) => return StatusCode::BAD_GATEWAY.into_response(),
    };

    let method = req.method().clone();
    let headers = req.headers().clone();
    let body_bytes = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::BAD_GATEWAY.into_response(),
    };

    let client = reqwest::Client::new();
    let mut upstream_req = client.request(method, target_uri.to_string());
    for (name, value) in headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        upstream_req = upstream_req.header(name, value);
    }
    upstream_req = upstream_req.body(body_bytes);

    match upstream_req.send().await {
        Ok(upstream_resp) => {
            let status = upstream_resp.status();
            let headers = upstream_resp.headers().clone();
            let bytes = upstream_resp.bytes().await.unwrap_or_default();
            let mut response = Response::builder().status(status);
            for (name, value) in headers.iter() {
                response = response.header(name, value);
            }
            response.body(Body::from(bytes)).unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}
