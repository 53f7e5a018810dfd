//! In-process `axum::Router` tests hitting the runner's HTTP surface
//! directly, without a real `docker` binary: every request here either
//! short-circuits on the shared-secret middleware or on workspace-id
//! validation, both of which run before any subprocess is spawned.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cloudide_runner::config::Config;
use cloudide_runner::state::AppState;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-shared-secret";

fn test_config(workspaces_dir: &std::path::Path) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        workspaces_dir: workspaces_dir.to_string_lossy().to_string(),
        shared_secret: SECRET.to_string(),
        memory_mb: 512,
        cpus: 1.0,
        pids_limit: 128,
        seccomp_profile_path: None,
    }
}

fn app(workspaces_dir: &std::path::Path) -> axum::Router {
    let state = Arc::new(AppState::new(test_config(workspaces_dir)));
    cloudide_runner::http::router(state)
}

#[tokio::test]
async fn healthz_requires_no_secret() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn containers_status_without_secret_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/containers/status?workspace_id=11111111-1111-4111-8111-111111111111")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn containers_status_with_wrong_secret_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/containers/status?workspace_id=11111111-1111-4111-8111-111111111111")
                .header("X-Runner-Secret", "not-the-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn containers_status_with_invalid_workspace_id_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .uri("/containers/status?workspace_id=not-a-uuid")
                .header("X-Runner-Secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // Past the shared-secret gate, the id validator rejects before anything
    // touches docker.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn containers_exec_with_empty_argv_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/containers/exec")
                .header("X-Runner-Secret", SECRET)
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"workspace_id":"11111111-1111-4111-8111-111111111111","argv":[]}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
