use axum::extract::{Query, State};
use axum::Json;
use cloudide_core::ids::assert_workspace_id;
use cloudide_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RunnerResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub workspace_id: String,
    pub template: String,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub workspace_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub workspace_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub workspace_id: String,
    pub argv: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub async fn start(State(state): State<Arc<AppState>>, Json(body): Json<StartRequest>) -> RunnerResult<()> {
    assert_workspace_id(&body.workspace_id)?;
    state.supervisor.ensure_running(&body.workspace_id, &body.template).await?;
    Ok(())
}

pub async fn stop(State(state): State<Arc<AppState>>, Json(body): Json<StopRequest>) -> RunnerResult<()> {
    assert_workspace_id(&body.workspace_id)?;
    state.supervisor.stop(&body.workspace_id).await?;
    Ok(())
}

pub async fn status(State(state): State<Arc<AppState>>, Query(query): Query<StatusQuery>) -> RunnerResult<Json<StatusResponse>> {
    assert_workspace_id(&query.workspace_id)?;
    let running = state.supervisor.is_running(&query.workspace_id).await?;
    Ok(Json(StatusResponse { running }))
}

pub async fn exec(State(state): State<Arc<AppState>>, Json(body): Json<ExecRequest>) -> RunnerResult<Json<ExecResponse>> {
    assert_workspace_id(&body.workspace_id)?;
    if body.argv.is_empty() {
        return Err(CoreError::invalid_payload("argv must not be empty").into());
    }
    let result = state.supervisor.exec(&body.workspace_id, &body.argv, &body.env, body.cwd.as_deref()).await?;
    Ok(Json(ExecResponse {
        exit_code: result.exit_code,
        stdout: String::from_utf8_lossy(&result.stdout).to_string(),
        stderr: String::from_utf8_lossy(&result.stderr).to_string(),
    }))
}
