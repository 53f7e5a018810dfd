//! Workspace-relative path resolution and traversal prevention.
//!
//! `resolve_workspace_path` is the other gatekeeper of tenant isolation: it
//! must run before any I/O on a user-supplied relative path, and it
//! performs no I/O itself beyond the lexical resolution described here.

use crate::errors::CoreError;
use std::path::{Component, Path, PathBuf};

/// Resolve `rel` against `root`, rejecting any path that would escape it.
///
/// Steps:
/// 1. Normalise separators to `/`.
/// 2. Strip a single leading `/`.
/// 3. Resolve to an absolute path against `root`.
/// 4. Require the result equals `root` or starts with `root` + separator.
///
/// This is purely lexical — it does not consult the filesystem, so it gives
/// no signal about symlinks. Callers that walk a resolved path (the file
/// watcher, in particular) are responsible for rejecting symlinks that
/// would lead back outside `root`.
pub fn resolve_workspace_path(root: &Path, rel: &str) -> Result<PathBuf, CoreError> {
    let normalised = rel.replace('\\', "/");
    let stripped = normalised.strip_prefix('/').unwrap_or(&normalised);

    let mut resolved = root.to_path_buf();
    for segment in stripped.split('/') {
        match segment {
            "" | "." => continue,
            other => resolved.push(other),
        }
    }

    // `..` segments are pushed as literal components above and popped here
    // lexically; only the final resolved path is checked against `root`, so
    // a non-escaping path like `foo/../bar.txt` is accepted.
    let resolved = lexically_normalise(&resolved);
    let root = lexically_normalise(root);

    if resolved == root {
        return Ok(resolved);
    }

    match resolved.strip_prefix(&root) {
        Ok(_) => Ok(resolved),
        Err(_) => Err(CoreError::path_escape(format!(
            "path '{rel}' escapes the workspace root"
        ))),
    }
}

/// Collapse `.`/`..` components without touching the filesystem.
///
/// `Path::canonicalize` requires the path to exist, which is wrong for
/// `create`/`write` targets that do not yet exist on disk; this performs the
/// same collapsing lexically instead.
fn lexically_normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_relative_paths() {
        let root = Path::new("/workspaces/abc");
        let resolved = resolve_workspace_path(root, "src/main.rs").unwrap();
        assert_eq!(resolved, Path::new("/workspaces/abc/src/main.rs"));
    }

    #[test]
    fn strips_single_leading_slash() {
        let root = Path::new("/workspaces/abc");
        let resolved = resolve_workspace_path(root, "/src/main.rs").unwrap();
        assert_eq!(resolved, Path::new("/workspaces/abc/src/main.rs"));
    }

    #[test]
    fn root_itself_is_allowed() {
        let root = Path::new("/workspaces/abc");
        let resolved = resolve_workspace_path(root, "").unwrap();
        assert_eq!(resolved, root);
        let resolved = resolve_workspace_path(root, ".").unwrap();
        assert_eq!(resolved, root);
    }

    #[test]
    fn rejects_dot_dot_escape() {
        let root = Path::new("/workspaces/abc");
        assert!(resolve_workspace_path(root, "../etc/passwd").is_err());
        assert!(resolve_workspace_path(root, "foo/../../etc/passwd").is_err());
    }

    #[test]
    fn resolves_non_escaping_dot_dot_segments() {
        let root = Path::new("/workspaces/abc");
        let resolved = resolve_workspace_path(root, "foo/../bar.txt").unwrap();
        assert_eq!(resolved, Path::new("/workspaces/abc/bar.txt"));
    }

    #[test]
    fn rejects_backslash_escape() {
        let root = Path::new("/workspaces/abc");
        assert!(resolve_workspace_path(root, "..\\..\\etc\\passwd").is_err());
    }
}
