//! HTTP route wiring.

mod auth;
mod files;
mod git;
mod preview;
mod search;
mod settings;
mod tasks;
mod workspaces;

use axum::routing::{any, delete, get, post};
use axum::Json;
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = match &state.config.cors_allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<axum::http::HeaderValue>().expect("valid CORS origin"))
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/workspaces", get(workspaces::list).post(workspaces::create))
        .route("/workspaces/:id", get(workspaces::get).patch(workspaces::rename).delete(workspaces::destroy))
        .route("/workspaces/:id/start", post(workspaces::start))
        .route("/workspaces/:id/stop", post(workspaces::stop))
        .route("/workspaces/:id/settings", get(settings::get).put(settings::put))
        .route("/workspaces/:id/files", get(files::list))
        .route("/workspaces/:id/files/content", get(files::read).put(files::write))
        .route("/workspaces/:id/files/create", post(files::create))
        .route("/workspaces/:id/files/rename", post(files::rename))
        .route("/workspaces/:id/files/delete", delete(files::remove))
        .route("/workspaces/:id/search/files", get(search::files))
        .route("/workspaces/:id/search/text", post(search::text))
        .route("/workspaces/:id/git/init", post(git::init))
        .route("/workspaces/:id/git/clone", post(git::clone))
        .route("/workspaces/:id/git/credentials", post(git::add_credential).delete(git::remove_credential))
        .route("/workspaces/:id/git/status", get(git::status))
        .route("/workspaces/:id/git/stage", post(git::stage))
        .route("/workspaces/:id/git/unstage", post(git::unstage))
        .route("/workspaces/:id/git/commit", post(git::commit))
        .route("/workspaces/:id/git/checkout", post(git::checkout))
        .route("/workspaces/:id/git/pull", post(git::pull))
        .route("/workspaces/:id/git/push", post(git::push))
        .route("/workspaces/:id/git/diff", get(git::diff))
        .route("/workspaces/:id/git/branches", get(git::branches))
        .route("/workspaces/:id/tasks", get(tasks::list).post(tasks::create))
        .route("/workspaces/:id/tasks/:task_id", delete(tasks::cancel))
        .route("/preview/:workspace_id/:port", any(preview::forward))
        .route("/preview/:workspace_id/:port/*suffix", any(preview::forward))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "cloudide-broker",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
