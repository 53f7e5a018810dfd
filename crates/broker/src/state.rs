//! Shared application state, handed to every handler as `Arc<AppState>`.

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::runner_client::RunnerClient;
use crate::store::Store;
use crate::tasks::TaskRegistry;
use cloudide_core::jwt::SessionCodec;
use cloudide_core::search::FileListCache;
use cloudide_core::secrets::CredentialCipher;
use std::path::PathBuf;

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub session_codec: SessionCodec,
    pub credential_cipher: CredentialCipher,
    pub runner: RunnerClient,
    pub login_limiter: RateLimiter,
    pub start_limiter: RateLimiter,
    pub tasks: TaskRegistry,
    pub file_search_cache: FileListCache,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        let session_codec = SessionCodec::new(&config.jwt_secret);
        let credential_cipher = CredentialCipher::from_secret(&config.credential_secret);
        let runner = RunnerClient::new(config.runner_base_url.clone(), config.runner_shared_secret.clone());
        let login_limiter = RateLimiter::new(config.login_rate_limit_per_minute);
        let start_limiter = RateLimiter::new(config.workspace_start_rate_limit_per_minute);
        Self {
            config,
            store,
            session_codec,
            credential_cipher,
            runner,
            login_limiter,
            start_limiter,
            tasks: TaskRegistry::new(),
            file_search_cache: FileListCache::new(),
        }
    }

    /// Host-filesystem root for a workspace's files, the same directory
    /// the runner bind-mounts into the workspace's container.
    pub fn workspace_root(&self, workspace_id: &str) -> PathBuf {
        PathBuf::from(&self.config.workspaces_dir).join(workspace_id)
    }
}
