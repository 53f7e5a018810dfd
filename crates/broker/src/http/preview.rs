//! `ALL /preview/:workspace_id/:port[/suffix]` — browser-facing front door.
//!
//! The runner's own `/preview/...` is gated by `require_shared_secret`, so
//! no browser can reach it directly. Browsers also can't set an
//! `Authorization` header on an `<iframe>` request, so the session token
//! travels as a `token` query parameter instead; this handler verifies it
//! directly, re-checks workspace ownership, then forwards to the runner
//! with the shared-secret header attached.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use cloudide_core::ids::assert_workspace_id;
use std::collections::HashMap;
use std::sync::Arc;

use crate::state::AppState;

pub async fn forward(State(state): State<Arc<AppState>>, Path(params): Path<HashMap<String, String>>, req: Request<Body>) -> Response {
    let Some(workspace_id) = params.get("workspace_id") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(port_str) = params.get("port") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if assert_workspace_id(workspace_id).is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Ok(port) = port_str.parse::<u16>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if port == 0 {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let query_pairs = parse_query(req.uri().query().unwrap_or(""));
    let Some(token) = query_pairs.iter().find(|(k, _)| k == "token").map(|(_, v)| v.as_str()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let claims = match state.session_codec.verify(token) {
        Ok(claims) => claims,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    let workspace = match state.store.find_workspace(workspace_id) {
        Ok(Some(workspace)) => workspace,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    if workspace.owner_id != claims.sub {
        return StatusCode::NOT_FOUND.into_response();
    }

    let suffix = params.get("suffix").map(String::as_str).unwrap_or("");
    let forwarded_query = query_pairs
        .iter()
        .filter(|(k, _)| k != "token")
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let headers = req
        .headers()
        .iter()
        .filter(|(name, _)| name.as_str().eq_ignore_ascii_case("accept") || name.as_str().eq_ignore_ascii_case("user-agent"))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
        .collect::<Vec<_>>();
    let method = req.method().clone();
    let body_bytes = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::BAD_GATEWAY.into_response(),
    };

    let reqwest_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return StatusCode::BAD_GATEWAY.into_response(),
    };

    match state
        .runner
        .forward_preview(workspace_id, port, suffix, &forwarded_query, reqwest_method, &headers, body_bytes)
        .await
    {
        Ok(upstream) => {
            let status = upstream.status();
            let response_headers = upstream.headers().clone();
            let bytes = upstream.bytes().await.unwrap_or_default();
            let mut response = Response::builder().status(status.as_u16());
            for (name, value) in response_headers.iter() {
                if name.as_str().eq_ignore_ascii_case("transfer-encoding") {
                    continue;
                }
                response = response.header(name.as_str(), value.as_bytes());
            }
            response.body(Body::from(bytes)).unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
