//! SQLite-backed persistence.
//!
//! A single `rusqlite::Connection` wrapped in a `Mutex` is enough for this
//! system's write volume; reads and writes both go through it so the
//! broker never has to reason about SQLite's file-level locking directly.

use chrono::{DateTime, Utc};
use cloudide_core::models::{GitCredential, Template, User, Workspace, WorkspaceSettings, WorkspaceStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Mutex;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workspaces (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                template TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workspace_settings (
                workspace_id TEXT PRIMARY KEY REFERENCES workspaces(id),
                settings TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS git_credentials (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL REFERENCES workspaces(id),
                host TEXT NOT NULL,
                username TEXT NOT NULL,
                ciphertext TEXT NOT NULL,
                iv TEXT NOT NULL,
                tag TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO users (id, email, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, email, username, password_hash, now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> rusqlite::Result<Option<User>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE email = ?1",
            params![email],
            row_to_user,
        )
        .optional()
    }

    pub fn find_user_by_username(&self, username: &str) -> rusqlite::Result<Option<User>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .optional()
    }

    pub fn find_user_by_id(&self, id: &str) -> rusqlite::Result<Option<User>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()
    }

    pub fn create_workspace(&self, workspace: &Workspace) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO workspaces (id, owner_id, name, template, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                workspace.id,
                workspace.owner_id,
                workspace.name,
                workspace.template.as_str(),
                status_str(workspace.status),
                workspace.created_at.to_rfc3339(),
                workspace.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_workspaces_for_owner(&self, owner_id: &str) -> rusqlite::Result<Vec<Workspace>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, template, status, created_at, updated_at
             FROM workspaces WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], row_to_workspace)?;
        rows.collect()
    }

    pub fn find_workspace(&self, id: &str) -> rusqlite::Result<Option<Workspace>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, owner_id, name, template, status, created_at, updated_at
             FROM workspaces WHERE id = ?1",
            params![id],
            row_to_workspace,
        )
        .optional()
    }

    pub fn update_workspace_status(&self, id: &str, status: WorkspaceStatus, now: DateTime<Utc>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "UPDATE workspaces SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status_str(status), now.to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn rename_workspace(&self, id: &str, name: &str, now: DateTime<Utc>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "UPDATE workspaces SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now.to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn delete_workspace(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute("DELETE FROM workspace_settings WHERE workspace_id = ?1", params![id])?;
        conn.execute("DELETE FROM git_credentials WHERE workspace_id = ?1", params![id])?;
        conn.execute("DELETE FROM workspaces WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get_settings(&self, workspace_id: &str) -> rusqlite::Result<Option<WorkspaceSettings>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT workspace_id, settings, updated_at FROM workspace_settings WHERE workspace_id = ?1",
            params![workspace_id],
            row_to_settings,
        )
        .optional()
    }

    pub fn put_settings(&self, settings: &WorkspaceSettings) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO workspace_settings (workspace_id, settings, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(workspace_id) DO UPDATE SET settings = excluded.settings, updated_at = excluded.updated_at",
            params![
                settings.workspace_id,
                serde_json::to_string(&settings.settings).unwrap_or_else(|_| "{}".to_string()),
                settings.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn create_git_credential(&self, credential: &GitCredential) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO git_credentials (id, workspace_id, host, username, ciphertext, iv, tag, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                credential.id,
                credential.workspace_id,
                credential.host,
                credential.username,
                credential.ciphertext,
                credential.iv,
                credential.tag,
                credential.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_git_credential_for_host(&self, workspace_id: &str, host: &str) -> rusqlite::Result<Option<GitCredential>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, workspace_id, host, username, ciphertext, iv, tag, created_at
             FROM git_credentials WHERE workspace_id = ?1 AND host = ?2
             ORDER BY created_at DESC LIMIT 1",
            params![workspace_id, host],
            row_to_credential,
        )
        .optional()
    }

    pub fn delete_git_credential(&self, workspace_id: &str, host: &str) -> rusqlite::Result<usize> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "DELETE FROM git_credentials WHERE workspace_id = ?1 AND host = ?2",
            params![workspace_id, host],
        )
    }
}

fn status_str(status: WorkspaceStatus) -> &'static str {
    match status {
        WorkspaceStatus::Creating => "creating",
        WorkspaceStatus::Stopped => "stopped",
        WorkspaceStatus::Starting => "starting",
        WorkspaceStatus::Running => "running",
        WorkspaceStatus::Stopping => "stopping",
        WorkspaceStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> WorkspaceStatus {
    match s {
        "stopped" => WorkspaceStatus::Stopped,
        "starting" => WorkspaceStatus::Starting,
        "running" => WorkspaceStatus::Running,
        "stopping" => WorkspaceStatus::Stopping,
        "error" => WorkspaceStatus::Error,
        _ => WorkspaceStatus::Creating,
    }
}

fn parse_rfc3339(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_rfc3339(row.get(4)?),
    })
}

fn row_to_workspace(row: &Row) -> rusqlite::Result<Workspace> {
    let template: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(Workspace {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        template: Template::parse(&template).unwrap_or(Template::Web),
        status: parse_status(&status),
        created_at: parse_rfc3339(row.get(5)?),
        updated_at: parse_rfc3339(row.get(6)?),
    })
}

fn row_to_settings(row: &Row) -> rusqlite::Result<WorkspaceSettings> {
    let raw: String = row.get(1)?;
    Ok(WorkspaceSettings {
        workspace_id: row.get(0)?,
        settings: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
        updated_at: parse_rfc3339(row.get(2)?),
    })
}

fn row_to_credential(row: &Row) -> rusqlite::Result<GitCredential> {
    Ok(GitCredential {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        host: row.get(2)?,
        username: row.get(3)?,
        ciphertext: row.get(4)?,
        iv: row.get(5)?,
        tag: row.get(6)?,
        created_at: parse_rfc3339(row.get(7)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudide_core::ids::generate_workspace_id;

    fn sample_workspace(owner_id: &str) -> Workspace {
        let now = Utc::now();
        Workspace {
            id: generate_workspace_id(),
            owner_id: owner_id.to_string(),
            name: "demo".to_string(),
            template: Template::Python,
            status: WorkspaceStatus::Creating,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn creates_and_finds_a_user() {
        let store = Store::open_in_memory().unwrap();
        store.create_user("user-1", "a@example.com", "a", "hash", Utc::now()).unwrap();
        let found = store.find_user_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(found.id, "user-1");
        assert!(store.find_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn round_trips_a_workspace_and_its_status() {
        let store = Store::open_in_memory().unwrap();
        store.create_user("user-1", "a@example.com", "a", "hash", Utc::now()).unwrap();
        let workspace = sample_workspace("user-1");
        store.create_workspace(&workspace).unwrap();

        let found = store.find_workspace(&workspace.id).unwrap().unwrap();
        assert_eq!(found.status, WorkspaceStatus::Creating);

        store.update_workspace_status(&workspace.id, WorkspaceStatus::Running, Utc::now()).unwrap();
        let found = store.find_workspace(&workspace.id).unwrap().unwrap();
        assert_eq!(found.status, WorkspaceStatus::Running);

        let listed = store.list_workspaces_for_owner("user-1").unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn deleting_a_workspace_removes_its_settings() {
        let store = Store::open_in_memory().unwrap();
        store.create_user("user-1", "a@example.com", "a", "hash", Utc::now()).unwrap();
        let workspace = sample_workspace("user-1");
        store.create_workspace(&workspace).unwrap();
        store
            .put_settings(&WorkspaceSettings {
                workspace_id: workspace.id.clone(),
                settings: serde_json::json!({"theme": "dark"}),
                updated_at: Utc::now(),
            })
            .unwrap();

        store.delete_workspace(&workspace.id).unwrap();
        assert!(store.find_workspace(&workspace.id).unwrap().is_none());
        assert!(store.get_settings(&workspace.id).unwrap().is_none());
    }
}
