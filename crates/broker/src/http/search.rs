use axum::extract::{Path, Query, State};
use axum::Json;
use cloudide_core::ids::assert_workspace_id;
use cloudide_core::search::{self, ContentSearchOptions};
use cloudide_core::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::error::BrokerResult;
use crate::state::AppState;

const DEFAULT_FILE_LIMIT: usize = 100;
const MAX_FILE_LIMIT: usize = 1000;

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

fn relativize(root: &std::path::Path, path: &std::path::Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string()
}

#[derive(Debug, Deserialize)]
pub struct FileSearchQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FileMatchDto {
    pub path: String,
    pub score: i64,
}

#[derive(Debug, Serialize)]
pub struct FileSearchResponse {
    pub matches: Vec<FileMatchDto>,
    pub truncated: bool,
}

/// `GET /workspaces/:id/search/files?q=&limit=` — fuzzy file-name search.
pub async fn files(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<FileSearchQuery>,
) -> BrokerResult<Json<FileSearchResponse>> {
    assert_ownership(&state, &user, &id).await?;

    let root = state.workspace_root(&id);
    let limit = query.limit.unwrap_or(DEFAULT_FILE_LIMIT).clamp(1, MAX_FILE_LIMIT);
    let q = query.q;
    let root_for_task = root.clone();

    // `search_files` walks the filesystem (or shells to `rg --files`) and
    // must never block the async executor thread.
    let outcome = tokio::task::spawn_blocking(move || search::search_files(&state.file_search_cache, &root_for_task, &q, limit))
        .await
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("file search task panicked: {e}")))?;

    let matches = outcome.matches.into_iter().map(|m| FileMatchDto { path: relativize(&root, &m.path), score: m.score }).collect();
    Ok(Json(FileSearchResponse { matches, truncated: outcome.truncated }))
}

#[derive(Debug, Deserialize)]
pub struct TextSearchRequest {
    pub query: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ContentMatchDto {
    pub path: String,
    pub line_number: usize,
    pub line: String,
    pub column_start: usize,
    pub column_end: usize,
}

#[derive(Debug, Serialize)]
pub struct TextSearchResponse {
    pub matches: Vec<ContentMatchDto>,
    pub truncated: bool,
}

/// `POST /workspaces/:id/search/text` — content search.
pub async fn text(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<TextSearchRequest>,
) -> BrokerResult<Json<TextSearchResponse>> {
    assert_ownership(&state, &user, &id).await?;

    let max_results = body
        .max_results
        .unwrap_or(search::DEFAULT_MAX_RESULTS)
        .clamp(1, search::MAX_MAX_RESULTS);
    let options = ContentSearchOptions {
        include_globs: body.include,
        exclude_globs: body.exclude,
        is_regex: body.is_regex,
        case_sensitive: body.case_sensitive,
        whole_word: body.whole_word,
    };
    let root = state.workspace_root(&id);
    let root_for_task = root.clone();
    let query = body.query;

    // `search_content` shells to `rg` (or scans in-process) and must never
    // block the async executor thread.
    let outcome = tokio::task::spawn_blocking(move || search::search_content(&root_for_task, &query, max_results, &options))
        .await
        .map_err(|e| CoreError::new(cloudide_core::ErrorKind::UpstreamFailed, format!("text search task panicked: {e}")))??;

    let matches = outcome
        .matches
        .into_iter()
        .map(|m| ContentMatchDto {
            path: relativize(&root, &m.path),
            line_number: m.line_number,
            line: m.line,
            column_start: m.column_start,
            column_end: m.column_end,
        })
        .collect();
    Ok(Json(TextSearchResponse { matches, truncated: outcome.truncated }))
}
