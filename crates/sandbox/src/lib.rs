//! Sandboxed path resolution for a workspace root.
//!
//! A [`Sandbox`] wraps a resolved, existing directory and offers the one
//! operation the rest of the runtime is allowed to trust: turning a
//! caller-supplied relative path into an absolute path that is provably a
//! descendant of the root. Every other crate that touches the filesystem
//! goes through this first.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised whenever a path would (or does) escape the sandboxed root.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("sandbox violation: {reason} (path={path:?})")]
pub struct SandboxViolation {
    /// The original, caller-supplied path.
    pub path: String,
    /// The fully resolved path we attempted to validate, if resolution
    /// got that far before being rejected.
    pub attempted_path: Option<String>,
    /// The sandbox root at the time of the violation.
    pub root: Option<String>,
    /// Short human-readable reason, e.g. "path traversal" or "absolute path".
    pub reason: String,
}

impl SandboxViolation {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            attempted_path: None,
            root: None,
            reason: reason.into(),
        }
    }

    fn with_attempt(mut self, attempted: impl Into<String>, root: impl Into<String>) -> Self {
        self.attempted_path = Some(attempted.into());
        self.root = Some(root.into());
        self
    }
}

/// A directory root plus sandbox-safe path operations over its descendants.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Validate that `root` exists and is a directory, and store its
    /// canonicalized absolute form.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxViolation> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|e| {
            SandboxViolation::new(
                root.to_string_lossy().to_string(),
                format!("root does not exist or is not accessible: {e}"),
            )
        })?;
        if !canonical.is_dir() {
            return Err(SandboxViolation::new(
                root.to_string_lossy().to_string(),
                "root is not a directory",
            ));
        }
        Ok(Self { root: canonical })
    }

    /// The resolved, absolute workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `rel` against the root, rejecting anything that could escape
    /// it. Rejection rules, checked before touching the filesystem:
    /// empty input, a null byte anywhere in the string, an absolute path
    /// (either separator convention), or any `..` component.
    ///
    /// After the syntactic checks the candidate path is resolved and a
    /// post-resolution prefix check against the canonical root is performed
    /// — this is the authoritative check, since it also catches symlinks
    /// that point outside the root.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, SandboxViolation> {
        if rel.is_empty() {
            return Err(SandboxViolation::new(rel, "empty path"));
        }
        if rel.contains('\0') {
            return Err(SandboxViolation::new(rel, "path contains a null byte"));
        }
        if rel.starts_with('/') || rel.starts_with('\\') || is_windows_absolute(rel) {
            return Err(SandboxViolation::new(rel, "absolute path"));
        }

        let candidate = Path::new(rel);
        for component in candidate.components() {
            match component {
                Component::ParentDir => {
                    return Err(SandboxViolation::new(rel, "path traversal ('..') not allowed"))
                }
                Component::Prefix(_) | Component::RootDir => {
                    return Err(SandboxViolation::new(rel, "absolute path"))
                }
                _ => {}
            }
        }

        let joined = self.root.join(candidate);
        let resolved = resolve_lexically_then_physically(&joined).map_err(|e| {
            SandboxViolation::new(rel, format!("failed to resolve path: {e}"))
                .with_attempt(joined.to_string_lossy().to_string(), self.root.to_string_lossy().to_string())
        })?;

        if !resolved.starts_with(&self.root) {
            return Err(SandboxViolation::new(rel, "resolved path escapes workspace root")
                .with_attempt(resolved.to_string_lossy().to_string(), self.root.to_string_lossy().to_string()));
        }

        Ok(resolved)
    }

    /// Cheap, non-authoritative hint: is `path` (already resolved) a
    /// descendant of the root by a plain prefix check on normalized paths?
    /// Security-critical decisions must use [`Sandbox::resolve`] instead.
    pub fn is_within(&self, path: &Path) -> bool {
        normalize_lexical(path).starts_with(normalize_lexical(&self.root))
    }
}

fn is_windows_absolute(rel: &str) -> bool {
    let bytes = rel.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

/// Resolve a path that may not exist yet: canonicalize the deepest existing
/// ancestor, then lexically append the remaining (non-existent) components.
/// This lets `resolve` reject traversal for paths being created (e.g. a new
/// file under a sandboxed directory) without requiring the file to already
/// exist, while still following real symlinks for the part that does exist.
fn resolve_lexically_then_physically(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(canon) => {
                let mut result = canon;
                for component in tail.into_iter().rev() {
                    result.push(component);
                }
                return Ok(normalize_lexical(&result));
            }
            Err(_) => {
                let Some(file_name) = existing.file_name() else {
                    // Hit the filesystem root without finding anything that
                    // canonicalizes; fall back to a purely lexical normalization.
                    return Ok(normalize_lexical(path));
                };
                tail.push(file_name.to_os_string());
                if !existing.pop() {
                    return Ok(normalize_lexical(path));
                }
            }
        }
    }
}

/// Collapse `.` and resolve `..` against the preceding component purely
/// lexically (no filesystem access) — used once a path's existing prefix
/// has already been canonicalized.
fn normalize_lexical(path: &Path) -> PathBuf {
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
    use tempfile::tempdir;

    #[test]
    fn rejects_traversal_and_absolute_and_null_and_empty() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        for rel in ["", "..", "../x", "/abs", "a/../..", "x\0y"] {
            assert!(sandbox.resolve(rel).is_err(), "expected rejection for {rel:?}");
        }
    }

    #[test]
    fn rejects_windows_style_absolute() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        assert!(sandbox.resolve("C:\\abs").is_err());
    }

    #[test]
    fn accepts_and_confirms_within_root() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/c.txt"), "hi").unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let resolved = sandbox.resolve("a/b/c.txt").unwrap();
        assert!(sandbox.is_within(&resolved));
        assert!(resolved.starts_with(sandbox.root()));
    }

    #[test]
    fn accepts_path_to_file_that_does_not_exist_yet() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let resolved = sandbox.resolve("new/dir/file.txt").unwrap();
        assert!(resolved.starts_with(sandbox.root()));
    }

    #[test]
    fn symlink_escaping_root_is_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
            let sandbox = Sandbox::new(dir.path()).unwrap();
            let result = sandbox.resolve("escape/secret.txt");
            assert!(result.is_err());
        }
    }
}
