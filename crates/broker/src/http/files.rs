use axum::extract::{Path, Query, State};
use axum::Json;
use cloudide_core::ids::assert_workspace_id;
use cloudide_core::path_safety::resolve_workspace_path;
use cloudide_core::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::error::BrokerResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub path: String,
    pub is_dir: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub from: String,
    pub to: String,
}

async fn workspace_root(state: &AppState, user: &CurrentUser, id: &str) -> BrokerResult<std::path::PathBuf> {
    assert_workspace_id(id)?;
    let workspace = state
        .store
        .find_workspace(id)?
        .ok_or_else(|| CoreError::not_found(format!("workspace '{id}' not found")))?;
    if workspace.owner_id != user.user_id {
        return Err(CoreError::not_found(format!("workspace '{id}' not found")).into());
    }
    Ok(state.workspace_root(id))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> BrokerResult<Json<Vec<FileEntry>>> {
    let root = workspace_root(&state, &user, &id).await?;
    let dir = resolve_workspace_path(&root, &query.path)?;

    let mut entries = Vec::new();
    let read_dir = std::fs::read_dir(&dir)
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::NotFound, format!("cannot list '{}': {e}", query.path)))?;
    for entry in read_dir.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let rel = entry.path().strip_prefix(&root).unwrap_or(&entry.path()).to_string_lossy().to_string();
        entries.push(FileEntry { name, path: rel, is_dir });
    }
    entries.sort_by(|a, b| (!a.is_dir, &a.name).cmp(&(!b.is_dir, &b.name)));
    Ok(Json(entries))
}

pub async fn read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> BrokerResult<String> {
    let root = workspace_root(&state, &user, &id).await?;
    let target = resolve_workspace_path(&root, &query.path)?;
    std::fs::read_to_string(&target)
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::NotFound, format!("cannot read '{}': {e}", query.path)).into())
}

pub async fn write(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<WriteRequest>,
) -> BrokerResult<()> {
    let root = workspace_root(&state, &user, &id).await?;
    let target = resolve_workspace_path(&root, &body.path)?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::write(&target, body.content)
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("cannot write '{}': {e}", body.path)))?;
    Ok(())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CreateRequest>,
) -> BrokerResult<()> {
    let root = workspace_root(&state, &user, &id).await?;
    let target = resolve_workspace_path(&root, &body.path)?;
    let result = if body.is_dir {
        std::fs::create_dir_all(&target)
    } else {
        if target.exists() {
            return Err(CoreError::new(cloudide_core::ErrorKind::Conflict, format!("'{}' already exists", body.path)).into());
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(&target, [])
    };
    result.map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("cannot create '{}': {e}", body.path)))?;
    Ok(())
}

pub async fn rename(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> BrokerResult<()> {
    let root = workspace_root(&state, &user, &id).await?;
    let from = resolve_workspace_path(&root, &body.from)?;
    let to = resolve_workspace_path(&root, &body.to)?;
    std::fs::rename(&from, &to)
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("cannot rename '{}': {e}", body.from)))?;
    Ok(())
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> BrokerResult<()> {
    let root = workspace_root(&state, &user, &id).await?;
    let target = resolve_workspace_path(&root, &query.path)?;
    let metadata = std::fs::metadata(&target)
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::NotFound, format!("cannot delete '{}': {e}", query.path)))?;
    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(&target)
    } else {
        std::fs::remove_file(&target)
    };
    result.map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("cannot delete '{}': {e}", query.path)))?;
    Ok(())
}
