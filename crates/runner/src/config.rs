//! Environment-driven configuration.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub workspaces_dir: String,
    pub shared_secret: String,
    pub memory_mb: u64,
    pub cpus: f64,
    pub pids_limit: u64,
    pub seccomp_profile_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("RUNNER_BIND_ADDR", "0.0.0.0:8081"),
            workspaces_dir: env_or("BROKER_WORKSPACES_DIR", "./workspaces"),
            shared_secret: env_or("RUNNER_SHARED_SECRET", "dev-insecure-shared-secret"),
            memory_mb: env_u64("RUNNER_MEMORY_MB", 2048),
            cpus: env::var("RUNNER_CPUS").ok().and_then(|v| v.parse().ok()).unwrap_or(1.0),
            pids_limit: env_u64("RUNNER_PIDS_LIMIT", 256),
            seccomp_profile_path: env::var("RUNNER_SECCOMP_PROFILE").ok(),
        }
    }

    pub fn has_insecure_defaults(&self) -> bool {
        self.shared_secret == "dev-insecure-shared-secret"
    }

    /// Template-to-image mapping.
    pub fn image_for_template(&self, template: &str) -> &'static str {
        match template {
            "python" => "cloudide/python:latest",
            "node-ts" => "cloudide/node-ts:latest",
            "c" => "cloudide/c:latest",
            _ => "cloudide/web:latest",
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
