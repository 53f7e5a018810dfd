use axum::extract::{Path, Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use cloudide_core::ids::assert_workspace_id;
use cloudide_core::models::GitCredential;
use cloudide_core::secrets::EncryptedSecret;
use cloudide_core::{CoreError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::error::BrokerResult;
use crate::git_cli::GitCli;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddCredentialRequest {
    pub host: String,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialSummary {
    pub id: String,
    pub host: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct StatusEntryDto {
    pub code: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    pub remote_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCredentialQuery {
    pub host: String,
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

fn git_cli(state: &AppState, id: &str) -> GitCli {
    GitCli::new(state.runner.clone(), id)
}

/// Host a remote URL's auth is scoped to, whether `https://host/...` or the
/// scp-like `git@host:...` form.
fn parse_host(remote_url: &str) -> Option<String> {
    if let Some(rest) = remote_url.strip_prefix("https://").or_else(|| remote_url.strip_prefix("http://")) {
        let authority = rest.split('/').next()?;
        return Some(authority.rsplit('@').next().unwrap_or(authority).to_string());
    }
    if let Some(rest) = remote_url.strip_prefix("git@") {
        return rest.split(':').next().map(str::to_string);
    }
    None
}

/// Decrypt the workspace's stored credential for `host`, if any, into a
/// ready-to-use `Authorization: Basic ...` header value.
async fn credential_header(state: &AppState, workspace_id: &str, host: &str) -> BrokerResult<Option<String>> {
    let Some(credential) = state.store.find_git_credential_for_host(workspace_id, host)? else {
        return Ok(None);
    };
    let secret = EncryptedSecret {
        ciphertext: credential.ciphertext,
        iv: credential.iv,
        tag: credential.tag,
    };
    let token = state.credential_cipher.decrypt(&secret)?;
    let token = String::from_utf8(token).map_err(|_| CoreError::new(ErrorKind::InvalidPayload, "stored credential is not valid utf-8"))?;
    let basic = BASE64.encode(format!("{}:{}", credential.username, token));
    Ok(Some(format!("Authorization: Basic {basic}")))
}

/// Resolve the credential header for a bare `pull`/`push`, whose remote is
/// whatever `origin` is already configured to, not a URL on the request.
async fn credential_header_for_origin(state: &AppState, id: &str, cli: &GitCli) -> BrokerResult<Option<String>> {
    let Ok(remote_url) = cli.remote_url("origin").await else {
        return Ok(None);
    };
    match parse_host(&remote_url) {
        Some(host) => credential_header(state, id, &host).await,
        None => Ok(None),
    }
}

pub async fn add_credential(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<AddCredentialRequest>,
) -> BrokerResult<Json<CredentialSummary>> {
    assert_ownership(&state, &user, &id).await?;
    let sealed = state.credential_cipher.encrypt(body.token.as_bytes())?;
    let credential = GitCredential {
        id: uuid::Uuid::new_v4().to_string(),
        workspace_id: id,
        host: body.host,
        username: body.username,
        ciphertext: sealed.ciphertext,
        iv: sealed.iv,
        tag: sealed.tag,
        created_at: Utc::now(),
    };
    state.store.create_git_credential(&credential)?;
    Ok(Json(CredentialSummary {
        id: credential.id,
        host: credential.host,
        username: credential.username,
    }))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> BrokerResult<Json<Vec<StatusEntryDto>>> {
    assert_ownership(&state, &user, &id).await?;
    let entries = git_cli(&state, &id).status_porcelain().await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|e| StatusEntryDto { code: e.code, path: e.path })
            .collect(),
    ))
}

pub async fn init(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    git_cli(&state, &id).init().await?;
    Ok(())
}

pub async fn clone(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CloneRequest>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    let auth_header = match parse_host(&body.remote_url) {
        Some(host) => credential_header(&state, &id, &host).await?,
        None => None,
    };
    git_cli(&state, &id).clone(&body.remote_url, auth_header.as_deref()).await?;
    Ok(())
}

pub async fn stage(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<StageRequest>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    git_cli(&state, &id).stage(&body.paths).await?;
    Ok(())
}

pub async fn unstage(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<StageRequest>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    git_cli(&state, &id).unstage(&body.paths).await?;
    Ok(())
}

pub async fn commit(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CommitRequest>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    git_cli(&state, &id).commit(&body.message).await?;
    Ok(())
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CheckoutRequest>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    git_cli(&state, &id).checkout(&body.reference).await?;
    Ok(())
}

pub async fn pull(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    let cli = git_cli(&state, &id);
    let auth_header = credential_header_for_origin(&state, &id, &cli).await?;
    cli.pull(auth_header.as_deref()).await?;
    Ok(())
}

pub async fn push(State(state): State<Arc<AppState>>, user: CurrentUser, Path(id): Path<String>) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    let cli = git_cli(&state, &id);
    let auth_header = credential_header_for_origin(&state, &id, &cli).await?;
    cli.push(auth_header.as_deref()).await?;
    Ok(())
}

pub async fn remove_credential(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<RemoveCredentialQuery>,
) -> BrokerResult<()> {
    assert_ownership(&state, &user, &id).await?;
    state.store.delete_git_credential(&id, &query.host)?;
    Ok(())
}

pub async fn diff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> BrokerResult<String> {
    assert_ownership(&state, &user, &id).await?;
    Ok(git_cli(&state, &id).diff(query.path.as_deref()).await?)
}

pub async fn branches(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> BrokerResult<Json<Vec<String>>> {
    assert_ownership(&state, &user, &id).await?;
    Ok(Json(git_cli(&state, &id).branches().await?))
}
