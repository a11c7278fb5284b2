//! Workspace path derivation and the existence probe.
//!
//! Every repository endpoint maps its request fields onto a directory under
//! the caller-supplied root: `<root>/<domain>/<user>` for clones (git names
//! the project directory itself) and `<root>/<domain>/<user>/<project>` for
//! everything that targets an already-cloned repository.  Derivation is pure
//! and performs no I/O; malformed segments simply produce a path that the
//! filesystem or the external tool will reject later.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Owner-level base directory: `<root>/<domain>/<user>`.
pub fn base_dir(root: &str, domain: &str, user: &str) -> PathBuf {
    Path::new(root).join(domain).join(user)
}

/// Project directory: `<root>/<domain>/<user>/<project>`.
pub fn project_dir(root: &str, domain: &str, user: &str, project: &str) -> PathBuf {
    base_dir(root, domain, user).join(project)
}

/// Stat `path` and report whether it exists.
///
/// `NotFound` is a result, not a failure; any other stat error (permission
/// denied etc.) is propagated so callers can distinguish "absent" from "the
/// check itself could not be trusted".
pub async fn probe(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to stat {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_dir_extends_base_dir() {
        let base = base_dir("/srv/repos", "github.com", "alice");
        let full = project_dir("/srv/repos", "github.com", "alice", "widgets");
        assert_eq!(full, base.join("widgets"));
        assert_eq!(full.parent(), Some(base.as_path()));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = project_dir("/root", "gitlab.com", "bob", "tool");
        let b = project_dir("/root", "gitlab.com", "bob", "tool");
        assert_eq!(a, b);
    }

    #[test]
    fn segments_appear_in_order() {
        let path = project_dir("/data", "github.com", "carol", "app");
        assert_eq!(path, Path::new("/data/github.com/carol/app"));
    }

    #[tokio::test]
    async fn probe_missing_path_is_false() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        assert!(!probe(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn probe_existing_path_is_true() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(probe(tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn probe_is_idempotent_and_side_effect_free() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("repo");
        assert!(!probe(&target).await.unwrap());
        assert!(!probe(&target).await.unwrap());
        std::fs::create_dir(&target).unwrap();
        assert!(probe(&target).await.unwrap());
        assert!(probe(&target).await.unwrap());
    }
}
