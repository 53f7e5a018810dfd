//! Session token encode/decode.
//!
//! Tokens carry just enough to authenticate a request without a store
//! lookup on the hot path: the subject (user id) and the email shown back
//! to clients. Issuer and audience are fixed constants rather than
//! configuration, since both tiers of this system always agree on them.

use crate::errors::CoreError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const ISSUER: &str = "cloudide-broker";
const AUDIENCE: &str = "cloudide";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub iss: String,
    pub aud: String,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
}

/// Encodes and verifies session tokens with a single HMAC secret.
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for `user_id`/`email`, valid for `ttl_seconds`.
    pub fn issue(&self, user_id: &str, email: &str, now: i64, ttl_seconds: i64) -> Result<String, CoreError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp: now + ttl_seconds,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| CoreError::unauthorized(format!("failed to issue session token: {e}")))
    }

    /// Verify and decode a bearer token, rejecting wrong issuer/audience or
    /// an expired `exp` (validated by the `jsonwebtoken` crate itself).
    pub fn verify(&self, token: &str) -> Result<SessionClaims, CoreError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| CoreError::unauthorized(format!("invalid session token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_valid_token() {
        let codec = SessionCodec::new("test-signing-key");
        let token = codec.issue("user-1", "a@example.com", 1_000, 3_600).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn rejects_expired_tokens() {
        let codec = SessionCodec::new("test-signing-key");
        let token = codec.issue("user-1", "a@example.com", 1_000, -1).unwrap();
        assert!(codec.verify(&token).is_err());
    }

    #[test]
    fn rejects_tokens_signed_with_a_different_key() {
        let issuer = SessionCodec::new("key-a");
        let verifier = SessionCodec::new("key-b");
        let token = issuer.issue("user-1", "a@example.com", 1_000, 3_600).unwrap();
        assert!(verifier.verify(&token).is_err());
    }
}
