use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use cloudide_core::ids::assert_workspace_id;
use cloudide_core::CoreError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::error::BrokerResult;
use crate::state::AppState;
use crate::tasks::TaskHandle;

const KNOWN_TASKS: &[&str] = &["run", "build", "test", "preview", "custom"];

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task: String,
    #[serde(default)]
    pub command: Option<String>,
}

async fn assert_ownership(state: &AppState, user: &CurrentUser, id: &str) -> BrokerResult<()> {
    assert_workspace_id(id)?;
    let workspace = state
        .store
        .find_workspace(id)?
        .ok_or_else(|| CoreError::not_found(format!("workspace '{id}' not found")))?;
    if workspace.owner_id != user.user_id {
        return Err(CoreError::not_found(format!("workspace '{id}' not found")).into());
    }
    Ok(())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> BrokerResult<Json<Vec<TaskHandle>>> {
    assert_ownership(&state, &user, &id).await?;
    Ok(Json(state.tasks.list_for_workspace(&id)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CreateTaskRequest>,
) -> BrokerResult<Json<TaskHandle>> {
    assert_ownership(&state, &user, &id).await?;
    if !KNOWN_TASKS.contains(&body.task.as_str()) {
        return Err(CoreError::invalid_payload(format!("unknown task '{}'", body.task)).into());
    }

    let settings = state.store.get_settings(&id)?.map(|s| s.settings).unwrap_or_default();

    let command = if body.task == "custom" {
        body.command
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CoreError::invalid_payload("custom task requires a non-empty command"))?
    } else {
        settings
            .get("commands")
            .and_then(|c| c.get(&body.task))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| CoreError::invalid_payload(format!("no command configured for task '{}'", body.task)))?
    };

    let env: HashMap<String, String> = settings
        .get("env")
        .and_then(|e| e.as_object())
        .map(|obj| obj.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default();

    let started_at = Utc::now();
    let result = state
        .runner
        .exec(&id, &["sh".to_string(), "-lc".to_string(), command.clone()], &env, None)
        .await?;

    Ok(Json(state.tasks.record(&id, &body.task, &command, started_at, result.exit_code, result.stdout, result.stderr)))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, task_id)): Path<(String, String)>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    state
        .tasks
        .remove(&task_id)
        .ok_or_else(|| CoreError::not_found(format!("task '{task_id}' not found")))?;
    Ok(())
}
