use axum::extract::State;
use axum::Json;
use chrono::Utc;
use cloudide_core::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{hash_password, verify_password, CurrentUser};
use crate::error::BrokerResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> BrokerResult<Json<SessionResponse>> {
    let email = body.email.trim().to_lowercase();
    let username = body.username.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::invalid_payload("email is not valid").into());
    }
    if username.is_empty() {
        return Err(CoreError::invalid_payload("username must not be empty").into());
    }
    if body.password.len() < 8 {
        return Err(CoreError::invalid_payload("password must be at least 8 characters").into());
    }
    if state.store.find_user_by_email(&email)?.is_some() {
        return Err(CoreError::new(cloudide_core::ErrorKind::Conflict, "email already registered").into());
    }
    if state.store.find_user_by_username(&username)?.is_some() {
        return Err(CoreError::new(cloudide_core::ErrorKind::Conflict, "username already taken").into());
    }

    let user_id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&body.password);
    let now = Utc::now();
    state.store.create_user(&user_id, &email, &username, &password_hash, now)?;

    let token = state.session_codec.issue(&user_id, &email, now.timestamp(), state.config.session_ttl.as_secs() as i64)?;
    Ok(Json(SessionResponse {
        token,
        user_id,
        email,
        username,
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> BrokerResult<Json<SessionResponse>> {
    let email = body.email.trim().to_lowercase();
    if !state.login_limiter.check(&email) {
        return Err(CoreError::new(cloudide_core::ErrorKind::RateLimited, "too many login attempts").into());
    }

    let user = state
        .store
        .find_user_by_email(&email)?
        .ok_or_else(|| CoreError::unauthorized("invalid email or password"))?;

    if !verify_password(&body.password, &user.password_hash) {
        return Err(CoreError::unauthorized("invalid email or password").into());
    }

    let now = Utc::now();
    let token = state
        .session_codec
        .issue(&user.id, &user.email, now.timestamp(), state.config.session_ttl.as_secs() as i64)?;
    Ok(Json(SessionResponse {
        token,
        user_id: user.id,
        email: user.email,
        username: user.username,
    }))
}

pub async fn me(current_user: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: current_user.user_id,
        email: current_user.email,
        username: current_user.username,
    })
}
