//! Environment-driven configuration.
//!
//! Every setting has a sane local-development default so the binary can
//! start with zero configuration; production deployments are expected to
//! override the secrets at minimum.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: String,
    pub workspaces_dir: String,
    pub jwt_secret: String,
    pub credential_secret: String,
    pub runner_base_url: String,
    pub runner_shared_secret: String,
    pub session_ttl: Duration,
    pub cors_allowed_origin: Option<String>,
    pub login_rate_limit_per_minute: u32,
    pub workspace_start_rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BROKER_BIND_ADDR", "0.0.0.0:8080"),
            database_path: env_or("BROKER_DATABASE_PATH", "cloudide-broker.sqlite3"),
            workspaces_dir: env_or("BROKER_WORKSPACES_DIR", "./workspaces"),
            jwt_secret: env_or("BROKER_JWT_SECRET", "dev-insecure-jwt-secret"),
            credential_secret: env_or("BROKER_CREDENTIAL_SECRET", "dev-insecure-credential-secret"),
            runner_base_url: env_or("RUNNER_BASE_URL", "http://127.0.0.1:8081"),
            runner_shared_secret: env_or("RUNNER_SHARED_SECRET", "dev-insecure-shared-secret"),
            session_ttl: Duration::from_secs(env_u64("BROKER_SESSION_TTL_SECS", 86_400)),
            cors_allowed_origin: env::var("BROKER_CORS_ORIGIN").ok(),
            login_rate_limit_per_minute: env_u32("BROKER_LOGIN_RATE_LIMIT", 10),
            workspace_start_rate_limit_per_minute: env_u32("BROKER_START_RATE_LIMIT", 20),
        }
    }

    /// True when any secret still carries its insecure development default.
    pub fn has_insecure_defaults(&self) -> bool {
        self.jwt_secret == "dev-insecure-jwt-secret"
            || self.credential_secret == "dev-insecure-credential-secret"
            || self.runner_shared_secret == "dev-insecure-shared-secret"
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
