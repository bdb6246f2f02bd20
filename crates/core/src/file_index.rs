//! In-memory file index with Python import graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lang::python_intel;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    pub language: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
}

/// In-memory file index with a Python import graph, built from a
/// [`Workspace`]'s file tree. Queries imports / importers; selective
/// invalidation on single-file changes.
pub struct FileIndex<'w> {
    workspace: &'w Workspace,
    index: HashMap<String, FileMetadata>,
    import_graph: HashMap<String, Vec<String>>,
    reverse_graph: HashMap<String, Vec<String>>,
}

impl<'w> FileIndex<'w> {
    /// Build a complete file index by iterating `workspace.file_tree()`
    /// and extracting Python imports/exports for Python files.
    pub fn build(workspace: &'w Workspace) -> Self {
        let mut idx = FileIndex {
            workspace,
            index: HashMap::new(),
            import_graph: HashMap::new(),
            reverse_graph: HashMap::new(),
        };

        let tree = workspace.file_tree(&[]);
        for entry in &tree {
            if entry.is_dir {
                continue;
            }
            let (imports, exports) = if entry.language == "python" {
                let abs = workspace.root().join(&entry.path);
                let source = std::fs::read_to_string(&abs).unwrap_or_default();
                (extract_import_strings(&source), extract_export_names(&source))
            } else {
                (Vec::new(), Vec::new())
            };

            let meta = FileMetadata {
                path: entry.path.clone(),
                language: entry.language.clone(),
                size_bytes: entry.size_bytes,
                last_modified: entry.last_modified,
                imports: imports.clone(),
                exports,
            };
            if !imports.is_empty() {
                idx.import_graph.insert(entry.path.clone(), imports);
            }
            idx.index.insert(entry.path.clone(), meta);
        }

        idx.rebuild_reverse_graph();
        idx
    }

    pub fn get_imports(&self, rel_path: &str) -> Vec<String> {
        self.import_graph.get(rel_path).cloned().unwrap_or_default()
    }

    pub fn get_importers(&self, module_name: &str) -> Vec<String> {
        self.reverse_graph.get(module_name).cloned().unwrap_or_default()
    }

    pub fn get_metadata(&self, rel_path: &str) -> Option<&FileMetadata> {
        self.index.get(rel_path)
    }

    pub fn all_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.index.keys().cloned().collect();
        files.sort();
        files
    }

    pub fn languages(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for meta in self.index.values() {
            *counts.entry(meta.language.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Re-index a single file (or remove it if deleted), rebuilding the
    /// reverse graph afterward.
    pub fn invalidate_file(&mut self, rel_path: &str) {
        self.index.remove(rel_path);
        self.import_graph.remove(rel_path);

        let abs = self.workspace.root().join(rel_path);
        if abs.is_file() {
            if let Ok(metadata) = std::fs::metadata(&abs) {
                let language = crate::diagnostics::detect_language(rel_path).to_string();
                let (imports, exports) = if language == "python" {
                    let source = std::fs::read_to_string(&abs).unwrap_or_default();
                    (extract_import_strings(&source), extract_export_names(&source))
                } else {
                    (Vec::new(), Vec::new())
                };
                let meta = FileMetadata {
                    path: rel_path.to_string(),
                    language,
                    size_bytes: metadata.len(),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                    imports: imports.clone(),
                    exports,
                };
                if !imports.is_empty() {
                    self.import_graph.insert(rel_path.to_string(), imports);
                }
                self.index.insert(rel_path.to_string(), meta);
            }
        }

        self.rebuild_reverse_graph();
    }

    fn rebuild_reverse_graph(&mut self) {
        let mut rev: HashMap<String, Vec<String>> = HashMap::new();
        for (file_path, modules) in &self.import_graph {
            for module in modules {
                rev.entry(module.clone()).or_default().push(file_path.clone());
            }
        }
        self.reverse_graph = rev;
    }
}

fn extract_import_strings(source: &str) -> Vec<String> {
    let empty: HashSet<String> = HashSet::new();
    python_intel::resolve_imports(source, "", &empty, None)
        .into_iter()
        .map(|i| i.module)
        .collect()
}

fn extract_export_names(source: &str) -> Vec<String> {
    python_intel::extract_symbols(source)
        .into_iter()
        .filter(|s| s.parent.is_none())
        .map(|s| s.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn build_indexes_python_imports_and_exports() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "import os\n\ndef run():\n    pass\n").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let idx = FileIndex::build(&ws);
        let meta = idx.get_metadata("main.py").unwrap();
        assert_eq!(meta.imports, vec!["os".to_string()]);
        assert_eq!(meta.exports, vec!["run".to_string()]);
    }

    #[test]
    fn reverse_graph_tracks_importers() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "import shared\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "import shared\n").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let idx = FileIndex::build(&ws);
        let mut importers = idx.get_importers("shared");
        importers.sort();
        assert_eq!(importers, vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn invalidate_file_rebuilds_reverse_graph() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "import os\n").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let mut idx = FileIndex::build(&ws);
        std::fs::write(dir.path().join("a.py"), "import sys\n").unwrap();
        idx.invalidate_file("a.py");
        assert_eq!(idx.get_imports("a.py"), vec!["sys".to_string()]);
    }
}
