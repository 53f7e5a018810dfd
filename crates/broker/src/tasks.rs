//! Registry of completed workspace task runs.
//!
//! A task is a named shell command — `run`, `build`, `test`, `preview`, or
//! `custom` — resolved against the workspace's `settings.commands[task]`
//! and executed inside the workspace's container via the runner's exec
//! endpoint. This registry only remembers the outcome of each run for
//! listing/inspection; it does not stream output, which is what the exec
//! WebSocket protocol is for.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskHandle {
    pub id: String,
    pub workspace_id: String,
    pub task: String,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskHandle>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        workspace_id: &str,
        task: &str,
        command: &str,
        started_at: DateTime<Utc>,
        exit_code: i32,
        stdout: String,
        stderr: String,
    ) -> TaskHandle {
        let handle = TaskHandle {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            task: task.to_string(),
            command: command.to_string(),
            started_at,
            finished_at: Utc::now(),
            exit_code,
            stdout,
            stderr,
        };
        self.tasks.lock().expect("task registry mutex poisoned").insert(handle.id.clone(), handle.clone());
        handle
    }

    pub fn list_for_workspace(&self, workspace_id: &str) -> Vec<TaskHandle> {
        self.tasks
            .lock()
            .expect("task registry mutex poisoned")
            .values()
            .filter(|t| t.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    pub fn remove(&self, task_id: &str) -> Option<TaskHandle> {
        self.tasks.lock().expect("task registry mutex poisoned").remove(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_tasks_per_workspace() {
        let registry = TaskRegistry::new();
        let started_at = Utc::now();
        let handle = registry.record("ws-1", "test", "npm test", started_at, 0, "ok".to_string(), String::new());
        assert_eq!(registry.list_for_workspace("ws-1").len(), 1);
        assert_eq!(registry.list_for_workspace("ws-2").len(), 0);

        let removed = registry.remove(&handle.id).unwrap();
        assert_eq!(removed.command, "npm test");
        assert_eq!(removed.exit_code, 0);
        assert_eq!(registry.list_for_workspace("ws-1").len(), 0);
    }
}
