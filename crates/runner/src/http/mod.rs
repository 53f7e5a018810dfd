mod containers;
mod preview;

use axum::middleware;
use axum::routing::{any, get, post};
use axum::Json;
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/containers/start", post(containers::start))
        .route("/containers/stop", post(containers::stop))
        .route("/containers/exec", post(containers::exec))
        .route("/containers/status", get(containers::status))
        .route("/preview/:workspace_id/:port", any(preview::forward))
        .route("/preview/:workspace_id/:port/*suffix", any(preview::forward))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_shared_secret));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "cloudide-runner",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
