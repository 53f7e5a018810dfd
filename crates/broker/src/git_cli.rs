//! `git` execution inside a workspace's container.
//!
//! Every invocation runs through [`crate::runner_client::RunnerClient`]'s
//! exec endpoint against `/workspace`, the same directory the runner
//! bind-mounts into the container — git never touches the broker host's
//! filesystem or shells out locally. A short-lived credential, when one is
//! supplied, is injected via `-c http.extraHeader=...` rather than rewritten
//! into the remote URL, so it never ends up persisted in `.git/config`.

use crate::runner_client::RunnerClient;
use cloudide_core::{CoreError, ErrorKind};

#[derive(Debug, Clone)]
pub struct GitCli {
    runner: RunnerClient,
    workspace_id: String,
}

impl GitCli {
    pub fn new(runner: RunnerClient, workspace_id: &str) -> Self {
        Self { runner, workspace_id: workspace_id.to_string() }
    }

    async fn run(&self, global: Vec<String>, args: Vec<String>) -> Result<String, CoreError> {
        let mut argv = vec!["git".to_string()];
        argv.extend(global);
        argv.extend(args);
        let result = self
            .runner
            .exec(&self.workspace_id, &argv, &Default::default(), Some("/workspace"))
            .await
            .map_err(|e| CoreError::new(ErrorKind::UpstreamFailed, format!("runner exec failed: {e}")))?;
        if result.exit_code == 0 {
            Ok(result.stdout)
        } else {
            Err(CoreError::new(ErrorKind::UpstreamFailed, format!("git command failed: {}", result.stderr.trim())))
        }
    }

    fn auth_global(auth_header: Option<&str>) -> Vec<String> {
        match auth_header {
            Some(header) => vec!["-c".to_string(), format!("http.extraHeader={header}")],
            None => Vec::new(),
        }
    }

    pub async fn init(&self) -> Result<(), CoreError> {
        self.run(vec![], vec!["init".to_string()]).await.map(|_| ())
    }

    pub async fn clone(&self, remote_url: &str, auth_header: Option<&str>) -> Result<(), CoreError> {
        self.run(Self::auth_global(auth_header), vec!["clone".to_string(), remote_url.to_string(), ".".to_string()])
            .await
            .map(|_| ())
    }

    pub async fn stage(&self, paths: &[String]) -> Result<(), CoreError> {
        let mut args = vec!["add".to_string()];
        args.extend(paths.iter().cloned());
        self.run(vec![], args).await.map(|_| ())
    }

    pub async fn unstage(&self, paths: &[String]) -> Result<(), CoreError> {
        let mut args = vec!["restore".to_string(), "--staged".to_string()];
        args.extend(paths.iter().cloned());
        self.run(vec![], args).await.map(|_| ())
    }

    pub async fn commit(&self, message: &str) -> Result<(), CoreError> {
        self.run(vec![], vec!["commit".to_string(), "-m".to_string(), message.to_string()])
            .await
            .map(|_| ())
    }

    pub async fn checkout(&self, reference: &str) -> Result<(), CoreError> {
        self.run(vec![], vec!["checkout".to_string(), reference.to_string()]).await.map(|_| ())
    }

    pub async fn pull(&self, auth_header: Option<&str>) -> Result<(), CoreError> {
        self.run(Self::auth_global(auth_header), vec!["pull".to_string()]).await.map(|_| ())
    }

    pub async fn push(&self, auth_header: Option<&str>) -> Result<(), CoreError> {
        self.run(Self::auth_global(auth_header), vec!["push".to_string()]).await.map(|_| ())
    }

    /// The URL a named remote currently points at, used to resolve which
    /// stored credential (if any) applies to a bare `pull`/`push`.
    pub async fn remote_url(&self, name: &str) -> Result<String, CoreError> {
        self.run(vec![], vec!["remote".to_string(), "get-url".to_string(), name.to_string()])
            .await
            .map(|s| s.trim().to_string())
    }

    pub async fn status_porcelain(&self) -> Result<Vec<GitStatusEntry>, CoreError> {
        let raw = self.run(vec![], vec!["status".to_string(), "--porcelain=v1".to_string()]).await?;
        Ok(raw
            .lines()
            .filter(|l| l.len() > 3)
            .map(|l| GitStatusEntry {
                code: l[..2].to_string(),
                path: l[3..].to_string(),
            })
            .collect())
    }

    pub async fn diff(&self, path: Option<&str>) -> Result<String, CoreError> {
        let mut args = vec!["diff".to_string()];
        if let Some(path) = path {
            args.push("--".to_string());
            args.push(path.to_string());
        }
        self.run(vec![], args).await
    }

    pub async fn branches(&self) -> Result<Vec<String>, CoreError> {
        let raw = self.run(vec![], vec!["branch".to_string(), "--format=%(refname:short)".to_string()]).await?;
        Ok(raw.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
    }
}

#[derive(Debug, Clone)]
pub struct GitStatusEntry {
    pub code: String,
    pub path: String,
}
