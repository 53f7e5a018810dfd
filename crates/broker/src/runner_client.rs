//! HTTP client for the broker→runner trust boundary.
//!
//! Every request carries the shared-secret header; the runner rejects
//! anything without it. This client only covers the lifecycle and exec
//! calls the broker's HTTP handlers need directly — the terminal, exec, and
//! LSP WebSocket protocols are proxied by [`crate::ws::proxy`] instead.

use cloudide_core::models::Template;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SHARED_SECRET_HEADER: &str = "X-Runner-Secret";

#[derive(Debug, Clone)]
pub struct RunnerClient {
    http: reqwest::Client,
    base_url: String,
    shared_secret: String,
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    workspace_id: &'a str,
    template: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    workspace_id: &'a str,
    argv: &'a [String],
    env: &'a HashMap<String, String>,
    cwd: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct ExecResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunnerClient {
    pub fn new(base_url: String, shared_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            shared_secret,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn start(&self, workspace_id: &str, template: Template) -> Result<(), reqwest::Error> {
        self.http
            .post(self.url("/containers/start"))
            .header(SHARED_SECRET_HEADER, &self.shared_secret)
            .json(&StartRequest {
                workspace_id,
                template: template.as_str(),
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn stop(&self, workspace_id: &str) -> Result<(), reqwest::Error> {
        self.http
            .post(self.url("/containers/stop"))
            .header(SHARED_SECRET_HEADER, &self.shared_secret)
            .json(&serde_json::json!({ "workspace_id": workspace_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn status(&self, workspace_id: &str) -> Result<StatusResponse, reqwest::Error> {
        self.http
            .get(self.url(&format!("/containers/status?workspace_id={workspace_id}")))
            .header(SHARED_SECRET_HEADER, &self.shared_secret)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Run a one-shot command inside the workspace's container, forwarding
    /// `env` and, if given, `cwd`. Used for task delegation and in-container
    /// git execution — neither has any business running on the broker host.
    pub async fn exec(
        &self,
        workspace_id: &str,
        argv: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<ExecResponse, reqwest::Error> {
        self.http
            .post(self.url("/containers/exec"))
            .header(SHARED_SECRET_HEADER, &self.shared_secret)
            .json(&ExecRequest { workspace_id, argv, env, cwd })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Forward a browser's preview request to the runner's
    /// `/preview/:workspace_id/:port[/suffix]`, attaching the shared-secret
    /// header. The caller has already validated the session token and
    /// workspace ownership — this is a dumb pipe from here on.
    #[allow(clippy::too_many_arguments)]
    pub async fn forward_preview(
        &self,
        workspace_id: &str,
        port: u16,
        suffix: &str,
        query: &str,
        method: reqwest::Method,
        headers: &[(String, String)],
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut path = format!("/preview/{workspace_id}/{port}");
        if !suffix.is_empty() {
            path.push('/');
            path.push_str(suffix);
        }
        if !query.is_empty() {
            path.push('?');
            path.push_str(query);
        }
        let mut request = self.http.request(method, self.url(&path)).header(SHARED_SECRET_HEADER, &self.shared_secret);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        request.body(body).send().await
    }
}
