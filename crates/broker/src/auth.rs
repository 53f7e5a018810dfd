//! Password hashing and the `CurrentUser` request extractor.
//!
//! No password-hashing crate is part of this system's dependency stack, so
//! passwords are hashed as salted SHA-256 (`salt_hex:hash_hex`) rather than
//! pulling in a new crate family for a single call site. This is a
//! deliberate, documented tradeoff, not an oversight.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use cloudide_core::jwt::SessionCodec;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::BrokerError;
use crate::state::AppState;

pub fn hash_password(password: &str) -> String {
    // uuid's v4 generator is the only source of cryptographic randomness
    // already in the dependency stack; 16 random bytes make a fine salt.
    let salt_hex = uuid::Uuid::new_v4().simple().to_string();
    let hash_hex = hash_with_salt(password, &salt_hex);
    format!("{salt_hex}:{hash_hex}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected_hash)) = stored.split_once(':') else {
        return false;
    };
    let actual_hash = hash_with_salt(password, salt_hex);
    constant_time_eq(actual_hash.as_bytes(), expected_hash.as_bytes())
}

fn hash_with_salt(password: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The authenticated user attached to a request by the `Authorization:
/// Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = BrokerError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| cloudide_core::CoreError::unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| cloudide_core::CoreError::unauthorized("expected a Bearer token"))?;

        let claims = session_codec(state).verify(token)?;
        // The token carries the subject and email; the username is looked up
        // fresh from the store so a later username change is picked up
        // without needing to reissue every outstanding token.
        let user = state
            .store
            .find_user_by_id(&claims.sub)?
            .ok_or_else(|| cloudide_core::CoreError::unauthorized("session refers to an unknown user"))?;
        Ok(CurrentUser {
            user_id: claims.sub,
            email: claims.email,
            username: user.username,
        })
    }
}

fn session_codec(state: &AppState) -> &SessionCodec {
    &state.session_codec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_a_freshly_hashed_password() {
        let hashed = hash_password("correct horse battery staple");
        assert!(verify_password("correct horse battery staple", &hashed));
        assert!(!verify_password("wrong password", &hashed));
    }

    #[test]
    fn rejects_malformed_stored_hashes() {
        assert!(!verify_password("anything", "not-a-valid-stored-hash"));
    }
}
