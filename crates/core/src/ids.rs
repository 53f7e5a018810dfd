//! Workspace-id validation and container naming.
//!
//! `assert_workspace_id` is one of the two gatekeepers (with
//! [`crate::path_safety`]) that every user-supplied workspace id must pass
//! through before it reaches storage, the filesystem, or container-name
//! derivation.

use crate::errors::CoreError;
use once_cell_regex::workspace_id_regex;

mod once_cell_regex {
    use regex::Regex;
    use std::sync::OnceLock;

    pub fn workspace_id_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-4[0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$",
            )
            .expect("workspace id regex is valid")
        })
    }
}

/// The canonical prefix for every container this system manages.
pub const CONTAINER_NAME_PREFIX: &str = "cloudide-ws-";

/// Reject any string that is not shaped like a UUID v4, before any
/// filesystem, database, or container-name work happens.
pub fn assert_workspace_id(id: &str) -> Result<(), CoreError> {
    if workspace_id_regex().is_match(id) {
        Ok(())
    } else {
        Err(CoreError::invalid_id(format!(
            "workspace id '{id}' is not a valid UUID"
        )))
    }
}

/// Generate a fresh, server-assigned workspace id.
pub fn generate_workspace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Derive the deterministic container name for a workspace id.
///
/// Non-`[A-Za-z0-9_.-]` characters are replaced with `-`; in practice a
/// validated UUID never contains one, but the sanitisation is applied
/// unconditionally so the function stays safe even if called before
/// validation.
pub fn container_name(workspace_id: &str) -> String {
    let sanitised: String = workspace_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{CONTAINER_NAME_PREFIX}{sanitised}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_generated_ids() {
        let id = generate_workspace_id();
        assert!(assert_workspace_id(&id).is_ok());
    }

    #[test]
    fn rejects_non_uuid_shapes() {
        for bad in [
            "",
            "not-a-uuid",
            "../../etc/passwd",
            "00000000-0000-0000-0000-000000000000", // not v4
            "00000000000040008000000000000000",
        ] {
            assert!(assert_workspace_id(bad).is_err(), "expected {bad} to fail");
        }
    }

    #[test]
    fn container_name_has_stable_prefix() {
        let id = generate_workspace_id();
        let name = container_name(&id);
        assert_eq!(name, format!("{CONTAINER_NAME_PREFIX}{id}"));
    }

    #[test]
    fn container_name_sanitises_unsafe_characters() {
        let name = container_name("abc/def;rm -rf");
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'));
    }
}
