//! Single-pass workspace reconnaissance: symbol table, dependency graph,
//! test/schema inventories.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostics::detect_language;
use crate::lang::{python_intel, ts_intel};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInventory {
    pub test_files: Vec<String>,
    pub test_count: usize,
    pub frameworks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInventory {
    pub tables: Vec<String>,
    pub columns: BTreeMap<String, Vec<String>>,
    pub migration_files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    /// Indented file tree, one entry per line (directories end in `/`).
    pub file_tree: Vec<String>,
    /// Dotted symbol path → kind.
    pub symbol_table: BTreeMap<String, String>,
    /// File path → imported module strings.
    pub dependency_graph: BTreeMap<String, Vec<String>>,
    pub test_inventory: TestInventory,
    pub schema_inventory: SchemaInventory,
    pub line_counts: BTreeMap<String, usize>,
    pub language_histogram: BTreeMap<String, usize>,
    pub captured_at: DateTime<Utc>,
}

/// Closed set of filename glob-ish patterns used to detect test files.
fn is_test_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let basename = lower.rsplit('/').next().unwrap_or(&lower);
    lower.starts_with("tests/")
        || lower.starts_with("test/")
        || basename.starts_with("test_") && basename.ends_with(".py")
        || basename.ends_with("_test.py")
        || (basename.contains(".test.") && (basename.ends_with(".js") || basename.ends_with(".jsx") || basename.ends_with(".ts") || basename.ends_with(".tsx")))
        || (basename.contains(".spec.") && (basename.ends_with(".js") || basename.ends_with(".jsx") || basename.ends_with(".ts") || basename.ends_with(".tsx")))
        || lower.contains("__tests__/")
}

fn detect_frameworks(source: &str) -> Vec<&'static str> {
    let mut found = Vec::new();
    if source.contains("import pytest") || source.contains("from pytest") {
        found.push("pytest");
    }
    if source.contains("unittest.TestCase") {
        found.push("unittest");
    }
    if source.contains("from vitest") || source.contains("import { describe") && source.contains("vitest") {
        found.push("vitest");
    }
    if source.contains("jest.fn") || source.contains("from '@jest") || source.contains("describe(") {
        found.push("jest");
    }
    found
}

fn count_test_functions(source: &str, language: &str) -> usize {
    match language {
        "python" => Regex::new(r"(?m)^\s*(async\s+)?def\s+test_\w+")
            .unwrap()
            .find_iter(source)
            .count(),
        _ => Regex::new(r"\b(it|test)\s*\(")
            .unwrap()
            .find_iter(source)
            .count(),
    }
}

fn extract_sql_tables(source: &str) -> (Vec<String>, BTreeMap<String, Vec<String>>) {
    let mut tables = Vec::new();
    let mut columns = BTreeMap::new();

    let create_re = Regex::new(r"(?is)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`\"']?(\w+)[`\"']?\s*\(").unwrap();
    for caps in create_re.captures_iter(source) {
        let table = caps[1].to_string();
        let start = caps.get(0).unwrap().end();
        if let Some(body) = balanced_paren_body(&source[start - 1..]) {
            let cols: Vec<String> = body
                .lines()
                .filter_map(|line| {
                    let trimmed = line.trim().trim_end_matches(',');
                    let first_word = trimmed.split_whitespace().next()?;
                    let upper = first_word.to_ascii_uppercase();
                    if matches!(upper.as_str(), "PRIMARY" | "FOREIGN" | "UNIQUE" | "CONSTRAINT" | "CHECK" | "INDEX") {
                        None
                    } else {
                        Some(first_word.trim_matches(['`', '"', '\'']).to_string())
                    }
                })
                .filter(|s| !s.is_empty())
                .collect();
            columns.insert(table.clone(), cols);
        }
        tables.push(table);
    }

    (tables, columns)
}

/// Extract the content of a balanced `(...)` group starting at the given
/// opening paren.
fn balanced_paren_body(s: &str) -> Option<&str> {
    let mut depth = 0i32;
    let mut start = None;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = Some(idx + 1);
                }
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start?..idx]);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_alembic_migration(source: &str) -> bool {
    source.contains("op.create_table(")
}

/// Perform a single pass over the workspace: line counts, test/schema
/// inventories, symbol table, and dependency graph.
pub fn capture_snapshot(workspace: &Workspace) -> WorkspaceSnapshot {
    let tree = workspace.file_tree(&[]);
    let mut snapshot = WorkspaceSnapshot {
        captured_at: Utc::now(),
        ..Default::default()
    };

    let mut frameworks: HashSet<&'static str> = HashSet::new();
    let mut tables = Vec::new();
    let mut columns = BTreeMap::new();
    let mut migrations = Vec::new();

    for entry in &tree {
        snapshot
            .file_tree
            .push(format!("{}{}", if entry.is_dir { "" } else { "  " }, entry.path));

        if entry.is_dir {
            continue;
        }
        *snapshot.language_histogram.entry(entry.language.clone()).or_insert(0) += 1;

        let abs = workspace.root().join(&entry.path);
        let source = std::fs::read_to_string(&abs).unwrap_or_default();
        let line_count = source.lines().count();
        *snapshot.line_counts.entry(entry.language.clone()).or_insert(0) += line_count;

        if is_test_file(&entry.path) {
            snapshot.test_inventory.test_files.push(entry.path.clone());
            snapshot.test_inventory.test_count += count_test_functions(&source, &entry.language);
            for fw in detect_frameworks(&source) {
                frameworks.insert(fw);
            }
        }

        match entry.language.as_str() {
            "python" => {
                for symbol in python_intel::extract_symbols(&source) {
                    let dotted = module_path_for(&entry.path, &symbol.name);
                    snapshot.symbol_table.insert(dotted, symbol.kind);
                }
                let empty = HashSet::new();
                let imports: Vec<String> = python_intel::resolve_imports(&source, &entry.path, &empty, None)
                    .into_iter()
                    .map(|i| i.module)
                    .collect();
                if !imports.is_empty() {
                    snapshot.dependency_graph.insert(entry.path.clone(), imports);
                }
            }
            "typescript" | "typescriptreact" | "javascript" | "javascriptreact" => {
                for symbol in ts_intel::extract_symbols(&source) {
                    let dotted = module_path_for(&entry.path, &symbol.name);
                    snapshot.symbol_table.insert(dotted, symbol.kind);
                }
            }
            "sql" => {
                let (found_tables, found_columns) = extract_sql_tables(&source);
                tables.extend(found_tables);
                columns.extend(found_columns);
            }
            _ => {}
        }

        if entry.path.ends_with(".py") && is_alembic_migration(&source) {
            migrations.push(entry.path.clone());
        }
    }

    snapshot.test_inventory.frameworks = {
        let mut v: Vec<String> = frameworks.into_iter().map(str::to_string).collect();
        v.sort();
        v
    };
    tables.sort();
    tables.dedup();
    snapshot.schema_inventory = SchemaInventory {
        tables,
        columns,
        migration_files: migrations,
    };

    snapshot
}

fn module_path_for(path: &str, name: &str) -> String {
    let module = path
        .trim_end_matches(".py")
        .trim_end_matches(".ts")
        .trim_end_matches(".tsx")
        .trim_end_matches(".js")
        .trim_end_matches(".jsx")
        .replace('/', ".");
    format!("{module}.{name}")
}

/// Remove stale symbol/dependency entries for any changed file, re-extract
/// only those files, then rebuild the file tree and language histograms.
/// The schema inventory is preserved — schema rarely changes mid-build.
pub fn update_snapshot(
    snapshot: &WorkspaceSnapshot,
    changed_files: &[String],
    workspace: &Workspace,
) -> WorkspaceSnapshot {
    let mut next = snapshot.clone();
    let changed: HashSet<&String> = changed_files.iter().collect();

    next.symbol_table
        .retain(|dotted, _| !changed.iter().any(|f| dotted.starts_with(module_prefix(f).as_str())));
    next.dependency_graph.retain(|path, _| !changed.contains(path));

    for file in changed_files {
        let abs = workspace.root().join(file);
        let Ok(source) = std::fs::read_to_string(&abs) else {
            continue;
        };
        let language = detect_language(file).to_string();
        match language.as_str() {
            "python" => {
                for symbol in python_intel::extract_symbols(&source) {
                    next.symbol_table.insert(module_path_for(file, &symbol.name), symbol.kind);
                }
                let empty = HashSet::new();
                let imports: Vec<String> = python_intel::resolve_imports(&source, file, &empty, None)
                    .into_iter()
                    .map(|i| i.module)
                    .collect();
                if !imports.is_empty() {
                    next.dependency_graph.insert(file.clone(), imports);
                }
            }
            "typescript" | "typescriptreact" | "javascript" | "javascriptreact" => {
                for symbol in ts_intel::extract_symbols(&source) {
                    next.symbol_table.insert(module_path_for(file, &symbol.name), symbol.kind);
                }
            }
            _ => {}
        }
    }

    workspace.invalidate_cache();
    let tree = workspace.file_tree(&[]);
    next.file_tree = tree
        .iter()
        .map(|e| format!("{}{}", if e.is_dir { "" } else { "  " }, e.path))
        .collect();

    next.language_histogram.clear();
    next.line_counts.clear();
    for entry in &tree {
        if entry.is_dir {
            continue;
        }
        *next.language_histogram.entry(entry.language.clone()).or_insert(0) += 1;
    }

    next
}

fn module_prefix(file: &str) -> String {
    let module = file
        .trim_end_matches(".py")
        .trim_end_matches(".ts")
        .trim_end_matches(".tsx")
        .trim_end_matches(".js")
        .trim_end_matches(".jsx")
        .replace('/', ".");
    format!("{module}.")
}

/// Render a compact workspace brief: indented tree, aggregate stats,
/// symbol counts, test inventory, and first-ten database tables.
pub fn snapshot_to_workspace_info(snapshot: &WorkspaceSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# Workspace\n\n");
    out.push_str("## File tree\n");
    for line in &snapshot.file_tree {
        out.push_str(line);
        out.push('\n');
    }

    let total_lines: usize = snapshot.line_counts.values().sum();
    out.push_str(&format!("\n## Stats\n{total_lines} lines across {} languages\n", snapshot.language_histogram.len()));

    let (classes, functions, other) = snapshot.symbol_table.values().fold((0, 0, 0), |(c, f, o), kind| {
        match kind.as_str() {
            "class" => (c + 1, f, o),
            "function" | "method" => (c, f + 1, o),
            _ => (c, f, o + 1),
        }
    });
    out.push_str(&format!(
        "\n## Symbols\nclasses={classes} functions={functions} other={other}\n"
    ));

    out.push_str(&format!(
        "\n## Tests\n{} test files, {} test functions, frameworks: {}\n",
        snapshot.test_inventory.test_files.len(),
        snapshot.test_inventory.test_count,
        snapshot.test_inventory.frameworks.join(", ")
    ));

    out.push_str(&format!("\n## Database\n{} tables", snapshot.schema_inventory.tables.len()));
    if !snapshot.schema_inventory.tables.is_empty() {
        out.push_str(" (first 10: ");
        out.push_str(
            &snapshot
                .schema_inventory
                .tables
                .iter()
                .take(10)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push(')');
    }
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn capture_snapshot_detects_tests_and_symbols() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::write(
            dir.path().join("tests/test_foo.py"),
            "import pytest\n\ndef test_a():\n    assert True\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("app.py"), "def run():\n    pass\n").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let snapshot = capture_snapshot(&ws);
        assert_eq!(snapshot.test_inventory.test_files.len(), 1);
        assert_eq!(snapshot.test_inventory.test_count, 1);
        assert!(snapshot.test_inventory.frameworks.contains(&"pytest".to_string()));
        assert!(snapshot.symbol_table.contains_key("app.run"));
    }

    #[test]
    fn capture_snapshot_extracts_sql_tables_and_columns() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("schema.sql"),
            "CREATE TABLE users (\n  id INTEGER PRIMARY KEY,\n  name TEXT\n);\n",
        )
        .unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let snapshot = capture_snapshot(&ws);
        assert_eq!(snapshot.schema_inventory.tables, vec!["users".to_string()]);
        assert_eq!(snapshot.schema_inventory.columns["users"], vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn update_snapshot_preserves_schema_inventory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("schema.sql"), "CREATE TABLE t (id INTEGER);\n").unwrap();
        std::fs::write(dir.path().join("a.py"), "def old():\n    pass\n").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let snapshot = capture_snapshot(&ws);
        std::fs::write(dir.path().join("a.py"), "def new():\n    pass\n").unwrap();
        let updated = update_snapshot(&snapshot, &["a.py".to_string()], &ws);
        assert_eq!(updated.schema_inventory.tables, snapshot.schema_inventory.tables);
        assert!(updated.symbol_table.contains_key("a.new"));
        assert!(!updated.symbol_table.contains_key("a.old"));
    }
}
