//! `docker` CLI process wrapper.
//!
//! The runner never links against the Docker Engine API; every lifecycle
//! operation shells out to the `docker` binary, the same way the rest of
//! this system treats external tools as subprocesses rather than
//! dependencies. Each call runs inside [`tokio::task::spawn_blocking`]
//! since `std::process::Command` blocks the calling thread.

use crate::errors::CoreError;
use std::process::{Command, Output};
use std::time::Duration;

/// Resource and process limits applied to a container at creation time.
#[derive(Debug, Clone)]
pub struct LaunchPolicy {
    pub image: String,
    pub memory_mb: u64,
    pub cpus: f64,
    pub pids_limit: u64,
    pub read_only_rootfs: bool,
    pub network_enabled: bool,
    pub seccomp_profile_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Thin async facade over the `docker` CLI.
#[derive(Debug, Clone, Default)]
pub struct CliDocker;

impl CliDocker {
    pub fn new() -> Self {
        Self
    }

    /// `docker info`, used as a startup liveness check.
    pub async fn ping(&self) -> Result<(), CoreError> {
        run(|| Command::new("docker").arg("info").output()).await.map(|_| ())
    }

    /// Returns true if a container with this name exists, running or not.
    pub async fn exists(&self, name: &str) -> Result<bool, CoreError> {
        let name = name.to_string();
        let output = run_allow_failure(move || {
            Command::new("docker")
                .args(["inspect", "--type", "container", &name])
                .output()
        })
        .await?;
        Ok(output.status.success())
    }

    /// Returns true if the named container is in the `running` state.
    pub async fn is_running(&self, name: &str) -> Result<bool, CoreError> {
        let name = name.to_string();
        let output = run_allow_failure(move || {
            Command::new("docker")
                .args(["inspect", "-f", "{{.State.Running}}", &name])
                .output()
        })
        .await?;
        if !output.status.success() {
            return Ok(false);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    /// Create and start a container under `name` per `policy`, with
    /// `workspace_dir` bind-mounted at `/workspace`.
    pub async fn create_and_start(
        &self,
        name: &str,
        workspace_dir: &str,
        policy: &LaunchPolicy,
    ) -> Result<(), CoreError> {
        let name = name.to_string();
        let workspace_dir = workspace_dir.to_string();
        let policy = policy.clone();
        run(move || {
            let mut cmd = Command::new("docker");
            cmd.args(["run", "-d", "--name", &name]);
            cmd.args(["--user", "1000:1000"]);
            cmd.args(["--cap-drop", "ALL"]);
            cmd.arg("--security-opt").arg("no-new-privileges");
            if let Some(profile) = &policy.seccomp_profile_path {
                cmd.arg("--security-opt").arg(format!("seccomp={profile}"));
            }
            if policy.read_only_rootfs {
                cmd.arg("--read-only");
                cmd.args(["--tmpfs", "/tmp"]);
            }
            if !policy.network_enabled {
                cmd.args(["--network", "none"]);
            } else {
                // Publish every exposed port to an ephemeral host port so
                // the preview proxy can look each one up after the fact
                // instead of needing to know the image's ports up front.
                cmd.arg("-P");
            }
            cmd.arg("--memory").arg(format!("{}m", policy.memory_mb));
            cmd.arg("--cpus").arg(policy.cpus.to_string());
            cmd.arg("--pids-limit").arg(policy.pids_limit.to_string());
            cmd.arg("-v")
                .arg(format!("{workspace_dir}:/workspace"));
            cmd.args(["-w", "/workspace"]);
            cmd.arg(&policy.image);
            cmd.args(["tail", "-f", "/dev/null"]);
            cmd.output()
        })
        .await
        .map(|_| ())
    }

    /// `docker stop` with a grace period before `SIGKILL`.
    pub async fn stop(&self, name: &str, timeout: Duration) -> Result<(), CoreError> {
        let name = name.to_string();
        let timeout_secs = timeout.as_secs().to_string();
        run(move || {
            Command::new("docker")
                .args(["stop", "-t", &timeout_secs, &name])
                .output()
        })
        .await
        .map(|_| ())
    }

    pub async fn remove(&self, name: &str) -> Result<(), CoreError> {
        let name = name.to_string();
        run(move || Command::new("docker").args(["rm", "-f", &name]).output())
            .await
            .map(|_| ())
    }

    /// Resolve the host port a container's exposed `container_port/tcp` was
    /// published to, for the preview reverse proxy.
    pub async fn published_port(&self, name: &str, container_port: u16) -> Result<Option<u16>, CoreError> {
        let name = name.to_string();
        let spec = format!("{container_port}/tcp");
        let output = run_allow_failure(move || Command::new("docker").args(["port", &name, &spec]).output()).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        // docker prints one "host:port" mapping per line, e.g. "0.0.0.0:49153".
        let port = stdout
            .lines()
            .next()
            .and_then(|line| line.rsplit(':').next())
            .and_then(|p| p.trim().parse::<u16>().ok());
        Ok(port)
    }

    /// Run a one-shot command inside the container and capture its output.
    /// `env` is passed as `-e KEY=VALUE` pairs; `cwd` as `-w`, defaulting to
    /// the image's working directory (`/workspace`) when absent.
    pub async fn exec(
        &self,
        name: &str,
        argv: &[String],
        env: &std::collections::HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<ExecResult, CoreError> {
        let name = name.to_string();
        let argv = argv.to_vec();
        let env = env.clone();
        let cwd = cwd.map(str::to_string);
        let output = run_allow_failure(move || {
            let mut cmd = Command::new("docker");
            cmd.args(["exec"]);
            for (key, value) in &env {
                cmd.arg("-e").arg(format!("{key}={value}"));
            }
            if let Some(cwd) = &cwd {
                cmd.arg("-w").arg(cwd);
            }
            cmd.arg(&name);
            cmd.args(&argv);
            cmd.output()
        })
        .await?;
        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Run `f` on a blocking thread, mapping a non-zero exit into a
/// [`CoreError`] so callers that don't need the exit code can use `?`.
async fn run<F>(f: F) -> Result<Output, CoreError>
where
    F: FnOnce() -> std::io::Result<Output> + Send + 'static,
{
    let output = run_allow_failure(f).await?;
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::warn!(stderr = %stderr, "docker command failed");
        Err(CoreError::container(format!("docker command failed: {stderr}")))
    }
}

/// Run `f` on a blocking thread without interpreting the exit code, for
/// callers (`exists`, `is_running`, `exec`) that need to inspect it
/// themselves.
async fn run_allow_failure<F>(f: F) -> Result<Output, CoreError>
where
    F: FnOnce() -> std::io::Result<Output> + Send + 'static,
{
    tracing::debug!("spawning docker command");
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::container(format!("docker task panicked: {e}")))?
        .map_err(|e| CoreError::container(format!("failed to spawn docker: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_policy_is_cloneable_and_carries_defaults_sanely() {
        let policy = LaunchPolicy {
            image: "cloudide/python:latest".to_string(),
            memory_mb: 1024,
            cpus: 1.0,
            pids_limit: 256,
            read_only_rootfs: true,
            network_enabled: false,
            seccomp_profile_path: None,
        };
        let cloned = policy.clone();
        assert_eq!(cloned.image, policy.image);
        assert!(!cloned.network_enabled);
    }
}
