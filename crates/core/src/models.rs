//! Domain types shared by the broker's store and HTTP layer.
//!
//! These mirror the broker's SQLite tables closely enough that `rusqlite`
//! row mapping and `serde` JSON encoding can both use them directly,
//! without a separate DTO layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    /// `salt:hash` hex pair, never serialised back to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The language/runtime template a workspace was provisioned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    Python,
    NodeTs,
    C,
    Web,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::NodeTs => "node-ts",
            Self::C => "c",
            Self::Web => "web",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "python" => Some(Self::Python),
            "node-ts" => Some(Self::NodeTs),
            "c" => Some(Self::C),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

/// Lifecycle state of a workspace's backing container, as tracked by the
/// broker (the runner is the source of truth; this is the broker's cached
/// view, refreshed on status polls and lifecycle calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Creating,
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub template: Template,
    pub status: WorkspaceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-workspace editor/runtime preferences, stored as an opaque JSON blob
/// on the broker side and never interpreted there.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceSettings {
    pub workspace_id: String,
    #[serde(default)]
    pub settings: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// An encrypted git credential attached to a workspace.
///
/// `ciphertext`, `iv`, and `tag` are base64-encoded AES-256-GCM output
/// produced by [`crate::secrets`]; the plaintext token never reaches the
/// store or a log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitCredential {
    pub id: String,
    pub workspace_id: String,
    pub host: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub ciphertext: String,
    #[serde(skip_serializing)]
    pub iv: String,
    #[serde(skip_serializing)]
    pub tag: String,
    pub created_at: DateTime<Utc>,
}
