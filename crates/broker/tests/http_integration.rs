//! In-process `axum::Router` tests covering the register/login/me flow and
//! workspace CRUD, run against an in-memory store so no SQLite file or
//! runner process is needed.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::Json;
use cloudide_broker::config::Config;
use cloudide_broker::state::AppState;
use cloudide_broker::store::Store;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// A stand-in runner that answers every exec with a fixed exit code and
/// stdout, so task-delegation tests don't need a real container.
async fn spawn_mock_runner(exit_code: i32, stdout: &'static str) -> String {
    let app = axum::Router::new().route(
        "/containers/exec",
        post(move |Json(_body): Json<Value>| async move { Json(json!({ "exit_code": exit_code, "stdout": stdout, "stderr": "" })) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn test_config(workspaces_dir: &std::path::Path) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        database_path: ":memory:".to_string(),
        workspaces_dir: workspaces_dir.to_string_lossy().to_string(),
        jwt_secret: "test-jwt-secret".to_string(),
        credential_secret: "test-credential-secret".to_string(),
        runner_base_url: "http://127.0.0.1:1".to_string(),
        runner_shared_secret: "test-shared-secret".to_string(),
        session_ttl: Duration::from_secs(3600),
        cors_allowed_origin: None,
        login_rate_limit_per_minute: 100,
        workspace_start_rate_limit_per_minute: 100,
    }
}

fn app(workspaces_dir: &std::path::Path) -> axum::Router {
    let store = Store::open_in_memory().unwrap();
    let state = Arc::new(AppState::new(test_config(workspaces_dir), store));
    cloudide_broker::http::router(state)
}

fn app_with_runner(workspaces_dir: &std::path::Path, runner_base_url: &str) -> axum::Router {
    let store = Store::open_in_memory().unwrap();
    let mut config = test_config(workspaces_dir);
    config.runner_base_url = runner_base_url.to_string();
    let state = Arc::new(AppState::new(config, store));
    cloudide_broker::http::router(state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn register_then_me_round_trips_the_session_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "dev@example.com", "username": "dev", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::OK);
    let session = json_body(register).await;
    let token = session["token"].as_str().unwrap().to_string();

    let me = app
        .clone()
        .oneshot(Request::builder().uri("/auth/me").header("authorization", format!("Bearer {token}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let me_body = json_body(me).await;
    assert_eq!(me_body["email"], "dev@example.com");
}

#[tokio::test]
async fn me_without_a_token_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registering_the_same_email_twice_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let body = json!({"email": "dup@example.com", "username": "dup", "password": "correcthorsebattery"});

    let first = app.clone().oneshot(json_request("POST", "/auth/register", None, body.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(json_request("POST", "/auth/register", None, body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_with_the_wrong_password_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    app.clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "wrong@example.com", "username": "wrong", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "wrong@example.com", "password": "not-the-password"}),
        ))
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn workspace_lifecycle_create_list_get_destroy() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "owner@example.com", "username": "owner", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    let token = json_body(register).await["token"].as_str().unwrap().to_string();

    let create = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/workspaces",
            Some(&token),
            json!({"name": "my-workspace", "template": "python"}),
        ))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
    let workspace = json_body(create).await;
    let workspace_id = workspace["id"].as_str().unwrap().to_string();
    assert_eq!(workspace["status"], "stopped");

    let list = app
        .clone()
        .oneshot(Request::builder().uri("/workspaces").header("authorization", format!("Bearer {token}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let listed = json_body(list).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let get = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/workspaces/{workspace_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::OK);

    let destroy = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/workspaces/{workspace_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(destroy.status(), StatusCode::OK);

    let get_after_destroy = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/workspaces/{workspace_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_after_destroy.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn renaming_a_workspace_persists_the_new_name() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "renamer@example.com", "username": "renamer", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    let token = json_body(register).await["token"].as_str().unwrap().to_string();

    let create = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/workspaces",
            Some(&token),
            json!({"name": "old-name", "template": "python"}),
        ))
        .await
        .unwrap();
    let workspace_id = json_body(create).await["id"].as_str().unwrap().to_string();

    let rename = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/workspaces/{workspace_id}"),
            Some(&token),
            json!({"name": "new-name"}),
        ))
        .await
        .unwrap();
    assert_eq!(rename.status(), StatusCode::OK);
    assert_eq!(json_body(rename).await["name"], "new-name");

    let get = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/workspaces/{workspace_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(get).await["name"], "new-name");
}

#[tokio::test]
async fn creating_a_workspace_with_an_unknown_template_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "template@example.com", "username": "templateuser", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    let token = json_body(register).await["token"].as_str().unwrap().to_string();

    let create = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/workspaces",
            Some(&token),
            json!({"name": "bad-template", "template": "cobol"}),
        ))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_owners_workspace_is_not_found_for_another_owner() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let owner = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "owner2@example.com", "username": "owner2", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    let owner_token = json_body(owner).await["token"].as_str().unwrap().to_string();

    let other = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "intruder@example.com", "username": "intruder", "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    let other_token = json_body(other).await["token"].as_str().unwrap().to_string();

    let create = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/workspaces",
            Some(&owner_token),
            json!({"name": "private", "template": "web"}),
        ))
        .await
        .unwrap();
    let workspace_id = json_body(create).await["id"].as_str().unwrap().to_string();

    let intruder_get = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/workspaces/{workspace_id}"))
                .header("authorization", format!("Bearer {other_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(intruder_get.status(), StatusCode::NOT_FOUND);
}

async fn register_and_create_workspace(app: &axum::Router, email: &str, username: &str) -> (String, String) {
    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": email, "username": username, "password": "correcthorsebattery"}),
        ))
        .await
        .unwrap();
    let token = json_body(register).await["token"].as_str().unwrap().to_string();

    let create = app
        .clone()
        .oneshot(json_request("POST", "/workspaces", Some(&token), json!({"name": "ws", "template": "python"})))
        .await
        .unwrap();
    let workspace_id = json_body(create).await["id"].as_str().unwrap().to_string();
    (token, workspace_id)
}

#[tokio::test]
async fn creating_a_task_with_an_unknown_name_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "task-unknown@example.com", "taskunknown").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/tasks"),
            Some(&token),
            json!({"task": "deploy"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creating_a_custom_task_without_a_command_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "task-custom@example.com", "taskcustom").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/tasks"),
            Some(&token),
            json!({"task": "custom"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creating_a_named_task_with_no_configured_command_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "task-unconfigured@example.com", "taskunconfigured").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/tasks"),
            Some(&token),
            json!({"task": "test"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creating_a_configured_task_delegates_to_the_runner() {
    let dir = tempfile::tempdir().unwrap();
    let runner_base_url = spawn_mock_runner(0, "all tests passed").await;
    let app = app_with_runner(dir.path(), &runner_base_url);
    let (token, workspace_id) = register_and_create_workspace(&app, "task-delegate@example.com", "taskdelegate").await;

    let settings = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/workspaces/{workspace_id}/settings"),
            Some(&token),
            json!({"commands": {"test": "pytest"}, "env": {"PYTHONPATH": "/workspace/src"}}),
        ))
        .await
        .unwrap();
    assert_eq!(settings.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/tasks"),
            Some(&token),
            json!({"task": "test"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["exit_code"], 0);
    assert_eq!(body["stdout"], "all tests passed");
    assert_eq!(body["task"], "test");
    assert_eq!(body["command"], "pytest");
}

#[tokio::test]
async fn removing_a_git_credential_is_routed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "git-creds@example.com", "gitcreds").await;

    let add = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/git/credentials"),
            Some(&token),
            json!({"host": "github.com", "username": "dev", "token": "ghp_supersecret"}),
        ))
        .await
        .unwrap();
    assert_eq!(add.status(), StatusCode::OK);

    let remove = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/workspaces/{workspace_id}/git/credentials?host=github.com"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(remove.status(), StatusCode::OK);
}

#[tokio::test]
async fn preview_without_a_token_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "preview-notoken@example.com", "previewnotoken").await;
    let _ = token;

    let response = app
        .clone()
        .oneshot(Request::builder().uri(format!("/preview/{workspace_id}/3000")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn preview_with_an_invalid_port_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "preview-badport@example.com", "previewbadport").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/preview/{workspace_id}/not-a-port?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn file_search_finds_a_fuzzy_match_and_reports_a_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "search-files@example.com", "searchfiles").await;

    let workspace_dir = dir.path().join(&workspace_id).join("src");
    std::fs::create_dir_all(&workspace_dir).unwrap();
    std::fs::write(workspace_dir.join("main.rs"), "").unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/workspaces/{workspace_id}/search/files?q=main.rs"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let matches = body["matches"].as_array().unwrap();
    assert!(!matches.is_empty());
    assert_eq!(matches[0]["path"], "src/main.rs");
}

#[tokio::test]
async fn text_search_reports_line_and_column_positions() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "search-text@example.com", "searchtext").await;

    let workspace_dir = dir.path().join(&workspace_id);
    std::fs::write(workspace_dir.join("lib.rs"), "fn main() {\n    let needle = 1;\n}\n").unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/search/text"),
            Some(&token),
            json!({"query": "needle"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["line_number"], 2);
    assert_eq!(matches[0]["column_start"], 8);
    assert_eq!(matches[0]["column_end"], 14);
}

#[tokio::test]
async fn text_search_with_an_invalid_regex_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (token, workspace_id) = register_and_create_workspace(&app, "search-badregex@example.com", "searchbadregex").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/workspaces/{workspace_id}/search/text"),
            Some(&token),
            json!({"query": "(", "is_regex": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_for_another_owners_workspace_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (_owner_token, workspace_id) = register_and_create_workspace(&app, "preview-owner@example.com", "previewowner").await;
    let (intruder_token, _) = register_and_create_workspace(&app, "preview-intruder@example.com", "previewintruder").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/preview/{workspace_id}/3000?token={intruder_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
