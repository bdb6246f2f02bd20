//! Sandboxed path resolution; cached recursive tree; summary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use forge_ide_sandbox::Sandbox;
use serde::{Deserialize, Serialize};

use crate::diagnostics::detect_language;
use crate::errors::Result;

/// Directory names skipped by `file_tree` unless the caller supplies its
/// own ignore set.
pub const DEFAULT_SKIP_SET: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".tox",
    "dist",
    "build",
    ".mypy_cache",
    ".pytest_cache",
];

/// How long a cached tree/summary stays valid before a fresh walk is
/// forced, layered from [`crate::config`] (built-in default,
/// `forge_ide.toml`, then `FORGE_IDE_CACHE_TTL_S`).
fn cache_ttl() -> Duration {
    Duration::from_secs(crate::config::global().cache_ttl_s)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FileEntry {
    /// Relative to the workspace root, forward-slash separated.
    pub path: String,
    pub is_dir: bool,
    pub size_bytes: u64,
    pub language: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkspaceSummary {
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub languages: BTreeMap<String, usize>,
    pub last_modified: Option<DateTime<Utc>>,
}

struct TreeCache {
    key: Vec<String>,
    entries: Vec<FileEntry>,
    captured_at: Instant,
}

struct SummaryCache {
    summary: WorkspaceSummary,
    captured_at: Instant,
}

/// An absolute directory root plus sandbox-safe path operations over its
/// descendants, with TTL-guarded caches for the recursive tree and the
/// aggregate summary derived from it.
pub struct Workspace {
    sandbox: Sandbox,
    tree_cache: Mutex<Option<TreeCache>>,
    summary_cache: Mutex<Option<SummaryCache>>,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let sandbox = Sandbox::new(root)?;
        Ok(Self {
            sandbox,
            tree_cache: Mutex::new(None),
            summary_cache: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Resolve `rel` against the root; see [`forge_ide_sandbox::Sandbox::resolve`].
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        Ok(self.sandbox.resolve(rel)?)
    }

    /// Cheap, non-authoritative hint — see [`forge_ide_sandbox::Sandbox::is_within`].
    pub fn is_within(&self, path: &Path) -> bool {
        self.sandbox.is_within(path)
    }

    /// Walk the workspace, filtering `ignore_patterns` (or [`DEFAULT_SKIP_SET`]
    /// when empty). Results are sorted by path. Cached for [`cache_ttl`],
    /// keyed on the ignore set.
    pub fn file_tree(&self, ignore_patterns: &[String]) -> Vec<FileEntry> {
        let key: Vec<String> = if ignore_patterns.is_empty() {
            DEFAULT_SKIP_SET.iter().map(|s| s.to_string()).collect()
        } else {
            let mut v = ignore_patterns.to_vec();
            v.sort();
            v
        };

        {
            let cache = self.tree_cache.lock().unwrap();
            if let Some(c) = cache.as_ref() {
                if c.key == key && c.captured_at.elapsed() < cache_ttl() {
                    return c.entries.clone();
                }
            }
        }

        let skip: std::collections::HashSet<&str> = key.iter().map(|s| s.as_str()).collect();
        let mut entries = Vec::new();
        walk(self.root(), self.root(), &skip, &mut entries);
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut cache = self.tree_cache.lock().unwrap();
        *cache = Some(TreeCache {
            key,
            entries: entries.clone(),
            captured_at: Instant::now(),
        });
        entries
    }

    /// Aggregate the default-filtered file tree into a [`WorkspaceSummary`].
    /// Cached independently of `file_tree`, for [`cache_ttl`].
    pub fn workspace_summary(&self) -> WorkspaceSummary {
        {
            let cache = self.summary_cache.lock().unwrap();
            if let Some(c) = cache.as_ref() {
                if c.captured_at.elapsed() < cache_ttl() {
                    return c.summary.clone();
                }
            }
        }

        let entries = self.file_tree(&[]);
        let mut summary = WorkspaceSummary::default();
        for entry in &entries {
            if entry.is_dir {
                continue;
            }
            summary.file_count += 1;
            summary.total_size_bytes += entry.size_bytes;
            *summary.languages.entry(entry.language.clone()).or_insert(0) += 1;
            if let Some(mtime) = entry.last_modified {
                summary.last_modified = Some(match summary.last_modified {
                    Some(existing) if existing >= mtime => existing,
                    _ => mtime,
                });
            }
        }

        let mut cache = self.summary_cache.lock().unwrap();
        *cache = Some(SummaryCache {
            summary: summary.clone(),
            captured_at: Instant::now(),
        });
        summary
    }

    /// Clear both the tree and summary caches, forcing the next call of
    /// either to re-walk the filesystem.
    pub fn invalidate_cache(&self) {
        *self.tree_cache.lock().unwrap() = None;
        *self.summary_cache.lock().unwrap() = None;
    }
}

fn walk(
    root: &Path,
    dir: &Path,
    skip: &std::collections::HashSet<&str>,
    out: &mut Vec<FileEntry>,
) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if skip.contains(name_str.as_ref()) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if metadata.is_dir() {
            out.push(FileEntry {
                path: rel,
                is_dir: true,
                size_bytes: 0,
                language: "unknown".to_string(),
                last_modified: None,
            });
            walk(root, &path, skip, out);
        } else {
            let last_modified = metadata
                .modified()
                .ok()
                .map(DateTime::<Utc>::from);
            out.push(FileEntry {
                path: rel.clone(),
                is_dir: false,
                size_bytes: metadata.len(),
                language: detect_language(&rel).to_string(),
                last_modified,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_tree_skips_default_set_and_sorts() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        std::fs::write(dir.path().join("b.py"), "x").unwrap();
        std::fs::write(dir.path().join("a.py"), "x").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let tree = ws.file_tree(&[]);
        let paths: Vec<&str> = tree.iter().map(|e| e.path.as_str()).collect();
        assert!(!paths.iter().any(|p| p.starts_with(".git")));
        assert_eq!(paths, vec!["a.py", "b.py"]);
    }

    #[test]
    fn workspace_summary_aggregates_languages() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "hello").unwrap();
        std::fs::write(dir.path().join("b.py"), "world!!").unwrap();
        std::fs::write(dir.path().join("c.ts"), "x").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let summary = ws.workspace_summary();
        assert_eq!(summary.file_count, 3);
        assert_eq!(summary.languages["python"], 2);
        assert_eq!(summary.languages["typescript"], 1);
    }

    #[test]
    fn invalidate_cache_forces_rewalk() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        assert_eq!(ws.workspace_summary().file_count, 0);
        std::fs::write(dir.path().join("new.py"), "x").unwrap();
        ws.invalidate_cache();
        assert_eq!(ws.workspace_summary().file_count, 1);
    }

    #[test]
    fn resolve_rejects_traversal() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        assert!(ws.resolve("../x").is_err());
    }
}
