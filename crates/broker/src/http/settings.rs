use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use cloudide_core::ids::assert_workspace_id;
use cloudide_core::models::WorkspaceSettings;
use cloudide_core::CoreError;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::error::BrokerResult;
use crate::state::AppState;

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

pub async fn get(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> BrokerResult<Json<WorkspaceSettings>> {
    assert_ownership(&state, &user, &id).await?;
    let settings = state.store.get_settings(&id)?.unwrap_or(WorkspaceSettings {
        workspace_id: id,
        settings: serde_json::json!({}),
        updated_at: Utc::now(),
    });
    Ok(Json(settings))
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> BrokerResult<Json<WorkspaceSettings>> {
    assert_ownership(&state, &user, &id).await?;
    let settings = WorkspaceSettings {
        workspace_id: id,
        settings: body,
        updated_at: Utc::now(),
    };
    state.store.put_settings(&settings)?;
    Ok(Json(settings))
}
