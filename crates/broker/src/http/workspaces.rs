use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use cloudide_core::ids::{assert_workspace_id, generate_workspace_id};
use cloudide_core::models::{Template, Workspace, WorkspaceStatus};
use cloudide_core::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::error::BrokerResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub template: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub status: String,
}

pub async fn list(State(state): State<Arc<AppState>>, user: CurrentUser) -> BrokerResult<Json<Vec<Workspace>>> {
    Ok(Json(state.store.list_workspaces_for_owner(&user.user_id)?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<CreateWorkspaceRequest>,
) -> BrokerResult<Json<Workspace>> {
    if body.name.trim().is_empty() {
        return Err(CoreError::invalid_payload("workspace name must not be empty").into());
    }
    let template = Template::parse(&body.template)
        .ok_or_else(|| CoreError::new(cloudide_core::ErrorKind::UnsupportedLanguage, format!("unknown template '{}'", body.template)))?;

    let now = Utc::now();
    let workspace = Workspace {
        id: generate_workspace_id(),
        owner_id: user.user_id,
        name: body.name,
        template,
        status: WorkspaceStatus::Stopped,
        created_at: now,
        updated_at: now,
    };
    state.store.create_workspace(&workspace)?;
    std::fs::create_dir_all(state.workspace_root(&workspace.id)).map_err(|e| {
        CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("failed to create workspace directory: {e}"))
    })?;
    Ok(Json(workspace))
}

async fn load_owned_workspace(state: &AppState, user: &CurrentUser, id: &str) -> BrokerResult<Workspace> {
    assert_workspace_id(id)?;
    let workspace = state
        .store
        .find_workspace(id)?
        .ok_or_else(|| CoreError::not_found(format!("workspace '{id}' not found")))?;
    if workspace.owner_id != user.user_id {
        return Err(CoreError::not_found(format!("workspace '{id}' not found")).into());
    }
    Ok(workspace)
}

pub async fn get(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<Json<Workspace>> {
    Ok(Json(load_owned_workspace(&state, &user, &id).await?))
}

pub async fn rename(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<RenameWorkspaceRequest>,
) -> BrokerResult<Json<Workspace>> {
    let mut workspace = load_owned_workspace(&state, &user, &id).await?;
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(CoreError::invalid_payload("workspace name must not be empty").into());
    }
    let now = Utc::now();
    state.store.rename_workspace(&id, &name, now)?;
    workspace.name = name;
    workspace.updated_at = now;
    Ok(Json(workspace))
}

pub async fn destroy(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<()> {
    load_owned_workspace(&state, &user, &id).await?;
    let _ = state.runner.stop(&id).await;
    state.store.delete_workspace(&id)?;
    let _ = std::fs::remove_dir_all(state.workspace_root(&id));
    Ok(())
}

pub async fn start(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<Json<StatusPayload>> {
    let workspace = load_owned_workspace(&state, &user, &id).await?;
    if !state.start_limiter.check(&user.user_id) {
        return Err(CoreError::new(cloudide_core::ErrorKind::RateLimited, "too many workspace starts").into());
    }

    state.store.update_workspace_status(&id, WorkspaceStatus::Starting, Utc::now())?;
    match state.runner.start(&id, workspace.template).await {
        Ok(()) => {
            state.store.update_workspace_status(&id, WorkspaceStatus::Running, Utc::now())?;
            Ok(Json(StatusPayload { status: "running".to_string() }))
        }
        Err(e) => {
            state.store.update_workspace_status(&id, WorkspaceStatus::Error, Utc::now())?;
            Err(CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("failed to start workspace: {e}")).into())
        }
    }
}

pub async fn stop(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<Json<StatusPayload>> {
    load_owned_workspace(&state, &user, &id).await?;
    state.store.update_workspace_status(&id, WorkspaceStatus::Stopping, Utc::now())?;
    state
        .runner
        .stop(&id)
        .await
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("failed to stop workspace: {e}")))?;
    state.store.update_workspace_status(&id, WorkspaceStatus::Stopped, Utc::now())?;
    Ok(Json(StatusPayload { status: "stopped".to_string() }))
}
