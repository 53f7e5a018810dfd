//! Container lifecycle with a per-workspace start-lock.
//!
//! Concurrent `start` calls for the same workspace (two browser tabs
//! reconnecting at once, a retrying client) must collapse into a single
//! `docker run`, not race each other into creating two containers or
//! erroring on a name collision. A lock map keyed by workspace id gives
//! each workspace its own serialised critical section while unrelated
//! workspaces still start in parallel.

use cloudide_core::docker::{CliDocker, LaunchPolicy};
use cloudide_core::ids::container_name;
use cloudide_core::CoreError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;

pub struct ContainerSupervisor {
    docker: CliDocker,
    config: Config,
    locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ContainerSupervisor {
    pub fn new(config: Config) -> Self {
        Self {
            docker: CliDocker::new(),
            config,
            locks: AsyncMutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, workspace_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(workspace_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Start the workspace's container if it is not already running.
    /// Idempotent: a second call while the container is already up is a
    /// no-op, not an error.
    pub async fn ensure_running(&self, workspace_id: &str, template: &str) -> Result<(), CoreError> {
        let lock = self.lock_for(workspace_id).await;
        let _guard = lock.lock().await;

        let name = container_name(workspace_id);
        if self.docker.is_running(&name).await? {
            return Ok(());
        }

        if self.docker.exists(&name).await? {
            self.docker.remove(&name).await?;
        }

        let workspace_dir = Path::new(&self.config.workspaces_dir).join(workspace_id);
        std::fs::create_dir_all(&workspace_dir)
            .map_err(|e| CoreError::container(format!("failed to prepare workspace directory: {e}")))?;

        let mut policy = self.base_policy(template);
        match self
            .docker
            .create_and_start(&name, &workspace_dir.to_string_lossy(), &policy)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if policy.seccomp_profile_path.is_some() => {
                // Some hosts (older kernels, gVisor) reject the seccomp
                // profile outright; retry once without it rather than
                // failing a workspace start over a hardening feature.
                tracing::warn!(error = %e, workspace_id, "docker run failed with seccomp profile, retrying without it");
                policy.seccomp_profile_path = None;
                self.docker.create_and_start(&name, &workspace_dir.to_string_lossy(), &policy).await
            }
            Err(e) => Err(e),
        }
    }

    /// Force-remove the workspace's container, transitioning it to
    /// `absent`. This is not a graceful `docker stop` — it terminates every
    /// PTY/exec/LSP child still attached without waiting for a grace
    /// period, since a stopped workspace has no business keeping a
    /// container alive at all.
    pub async fn stop(&self, workspace_id: &str) -> Result<(), CoreError> {
        let lock = self.lock_for(workspace_id).await;
        let _guard = lock.lock().await;
        let name = container_name(workspace_id);
        self.docker.remove(&name).await
    }

    pub async fn is_running(&self, workspace_id: &str) -> Result<bool, CoreError> {
        self.docker.is_running(&container_name(workspace_id)).await
    }

    pub async fn exec(
        &self,
        workspace_id: &str,
        argv: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<cloudide_core::docker::ExecResult, CoreError> {
        self.docker.exec(&container_name(workspace_id), argv, env, cwd).await
    }

    pub async fn published_port(&self, workspace_id: &str, container_port: u16) -> Result<Option<u16>, CoreError> {
        self.docker.published_port(&container_name(workspace_id), container_port).await
    }

    fn base_policy(&self, template: &str) -> LaunchPolicy {
        LaunchPolicy {
            image: self.config.image_for_template(template).to_string(),
            memory_mb: self.config.memory_mb,
            cpus: self.config.cpus,
            pids_limit: self.config.pids_limit,
            read_only_rootfs: true,
            network_enabled: true,
            seccomp_profile_path: self.config.seccomp_profile_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_policy_disables_write_access_to_rootfs() {
        let supervisor = ContainerSupervisor::new(Config {
            bind_addr: "127.0.0.1:0".to_string(),
            workspaces_dir: "/tmp/cloudide-test".to_string(),
            shared_secret: "test".to_string(),
            memory_mb: 512,
            cpus: 0.5,
            pids_limit: 64,
            seccomp_profile_path: None,
        });
        let policy = supervisor.base_policy("python");
        assert!(policy.read_only_rootfs);
        assert_eq!(policy.image, "cloudide/python:latest");
    }
}
