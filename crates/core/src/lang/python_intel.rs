//! Python symbol/import extraction and tool-output diagnostic parsers.
//!
//! Extraction here is a shallow, indentation-based outline scan rather than
//! a full AST walk — there is no Python grammar crate in this workspace's
//! dependency stack, and top-level and class-nested definitions are all
//! callers need; expression-level analysis is out of scope.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use serde_json::Value;

use super::{ImportInfo, Symbol};
use crate::contracts::{Diagnostic, Severity};
use crate::errors::{ForgeIdeError, Result};

/// Closed set of Python standard-library top-level module names used to
/// classify imports. Not exhaustive, but covers the common case.
const STDLIB_MODULES: &[&str] = &[
    "os", "sys", "re", "json", "io", "math", "time", "datetime", "collections", "itertools",
    "functools", "typing", "pathlib", "subprocess", "shutil", "logging", "unittest", "abc",
    "asyncio", "dataclasses", "enum", "contextlib", "copy", "hashlib", "random", "string",
    "textwrap", "traceback", "warnings", "weakref", "threading", "multiprocessing", "socket",
    "struct", "tempfile", "uuid", "csv", "configparser", "argparse", "inspect", "importlib",
    "pickle", "base64", "glob", "fnmatch", "sqlite3", "urllib", "http", "email", "xml", "ast",
];

/// Extract top-level (and class-nested) symbols from Python source.
///
/// Handles `def`, `async def`, `class`, top-level assignments (uppercase
/// name → constant, else variable), and annotated assignments. Names
/// starting with `_` are excluded. Returns an empty list if the source is
/// too malformed to scan meaningfully (e.g. no lines).
pub fn extract_symbols(source: &str) -> Vec<Symbol> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let def_re = Regex::new(r"^(\s*)(async\s+def|def)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
    let class_re = Regex::new(r"^(\s*)class\s+([A-Za-z_][A-Za-z0-9_]*)\s*[:(]").unwrap();
    let assign_re = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(:[^=]+)?=[^=]").unwrap();

    let mut symbols = Vec::new();
    let mut current_class: Option<(String, usize)> = None; // (name, indent)

    for (idx, line) in lines.iter().enumerate() {
        let indent = indent_of(line);
        let line_no = idx + 1;

        if let Some((_, class_indent)) = &current_class {
            if !line.trim().is_empty() && indent <= *class_indent {
                current_class = None;
            }
        }

        if let Some(caps) = class_re.captures(line) {
            let this_indent = caps[1].len();
            let name = caps[2].to_string();
            if name.starts_with('_') {
                continue;
            }
            let parent = if this_indent > 0 {
                current_class.as_ref().map(|(n, _)| n.clone())
            } else {
                None
            };
            let end_line = block_end(&lines, idx, this_indent);
            symbols.push(Symbol {
                name: name.clone(),
                kind: "class".to_string(),
                start_line: line_no,
                end_line,
                parent,
            });
            if this_indent == 0 {
                current_class = Some((name, this_indent));
            }
            continue;
        }

        if let Some(caps) = def_re.captures(line) {
            let this_indent = caps[1].len();
            let name = caps[3].to_string();
            if name.starts_with('_') {
                continue;
            }
            let parent = current_class
                .as_ref()
                .filter(|(_, class_indent)| this_indent > *class_indent)
                .map(|(n, _)| n.clone());
            let kind = if parent.is_some() { "method" } else { "function" };
            let end_line = block_end(&lines, idx, this_indent);
            symbols.push(Symbol {
                name,
                kind: kind.to_string(),
                start_line: line_no,
                end_line,
                parent,
            });
            continue;
        }

        if indent == 0 && current_class.is_none() {
            if let Some(caps) = assign_re.captures(line) {
                let name = caps[1].to_string();
                if name.starts_with('_') {
                    continue;
                }
                let kind = if name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_numeric()) {
                    "constant"
                } else {
                    "variable"
                };
                symbols.push(Symbol {
                    name,
                    kind: kind.to_string(),
                    start_line: line_no,
                    end_line: line_no,
                    parent: None,
                });
            }
        }
    }

    symbols
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Find the last line (1-based, inclusive) of the indented block that
/// starts at `header_idx` (0-based) with header indentation `header_indent`.
fn block_end(lines: &[&str], header_idx: usize, header_indent: usize) -> usize {
    let mut last = header_idx + 1;
    for (idx, line) in lines.iter().enumerate().skip(header_idx + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= header_indent {
            break;
        }
        last = idx + 1;
    }
    last
}

/// Extract imported modules from Python source and classify each as
/// stdlib, workspace-resolved, or third-party.
///
/// `workspace_files` is the set of all relative file paths in the
/// workspace, used to resolve `a.b.c` against `a/b/c.py` or
/// `a/b/c/__init__.py`. Relative imports (`from . import x`,
/// `from .x import y`) resolve against `file_path`'s directory.
pub fn resolve_imports(
    source: &str,
    file_path: &str,
    workspace_files: &HashSet<String>,
    stdlib_set: Option<&HashSet<String>>,
) -> Vec<ImportInfo> {
    let default_stdlib: HashSet<String> = STDLIB_MODULES.iter().map(|s| s.to_string()).collect();
    let stdlib = stdlib_set.unwrap_or(&default_stdlib);

    let import_re = Regex::new(r"^\s*import\s+([A-Za-z_][\w.]*)").unwrap();
    let from_re =
        Regex::new(r"^\s*from\s+(\.*)([A-Za-z_][\w.]*)?\s+import\s+(.+)$").unwrap();

    let file_dir: Vec<&str> = {
        let mut parts: Vec<&str> = file_path.split('/').collect();
        parts.pop();
        parts
    };

    let mut infos = Vec::new();

    for line in source.lines() {
        if let Some(caps) = import_re.captures(line) {
            let module = caps[1].to_string();
            let is_stdlib = is_stdlib_module(&module, stdlib);
            let resolved_path = resolve_workspace_module(&module, workspace_files);
            infos.push(ImportInfo {
                module,
                names: Vec::new(),
                resolved_path,
                is_stdlib,
            });
            continue;
        }

        if let Some(caps) = from_re.captures(line) {
            let dots = caps[1].len();
            let module_part = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let names: Vec<String> = caps[3]
                .split(',')
                .map(|n| n.trim().trim_start_matches('(').trim_end_matches(')').to_string())
                .filter(|n| !n.is_empty())
                .collect();

            if dots > 0 {
                if module_part.is_empty() {
                    // from . import x, y — each name is itself a sibling module.
                    for name in &names {
                        let module = format!("{}{}", ".".repeat(dots), name);
                        let resolved_path = resolve_relative_module(&file_dir, dots, name, workspace_files);
                        infos.push(ImportInfo {
                            module,
                            names: Vec::new(),
                            resolved_path,
                            is_stdlib: false,
                        });
                    }
                } else {
                    let module = format!("{}{}", ".".repeat(dots), module_part);
                    let resolved_path = resolve_relative_module(&file_dir, dots, module_part, workspace_files);
                    infos.push(ImportInfo {
                        module,
                        names,
                        resolved_path,
                        is_stdlib: false,
                    });
                }
            } else {
                let is_stdlib = is_stdlib_module(module_part, stdlib);
                let resolved_path = resolve_workspace_module(module_part, workspace_files);
                infos.push(ImportInfo {
                    module: module_part.to_string(),
                    names,
                    resolved_path,
                    is_stdlib,
                });
            }
        }
    }

    infos
}

fn is_stdlib_module(module: &str, stdlib: &HashSet<String>) -> bool {
    let top = module.split('.').next().unwrap_or(module);
    stdlib.contains(top)
}

fn resolve_workspace_module(module: &str, workspace_files: &HashSet<String>) -> Option<String> {
    let as_path = module.replace('.', "/");
    let candidate = format!("{as_path}.py");
    if workspace_files.contains(&candidate) {
        return Some(candidate);
    }
    let init_candidate = format!("{as_path}/__init__.py");
    if workspace_files.contains(&init_candidate) {
        return Some(init_candidate);
    }
    None
}

fn resolve_relative_module(
    file_dir: &[&str],
    dots: usize,
    module_suffix: &str,
    workspace_files: &HashSet<String>,
) -> Option<String> {
    let mut base = file_dir.to_vec();
    // One leading dot means "this package" (stay in file_dir); each
    // additional dot walks up one more level.
    for _ in 1..dots {
        base.pop();
    }
    let mut parts: Vec<&str> = base;
    for segment in module_suffix.split('.') {
        if !segment.is_empty() {
            parts.push(segment);
        }
    }
    let as_path = parts.join("/");
    let candidate = format!("{as_path}.py");
    if workspace_files.contains(&candidate) {
        return Some(candidate);
    }
    let init_candidate = format!("{as_path}/__init__.py");
    if workspace_files.contains(&init_candidate) {
        return Some(init_candidate);
    }
    None
}

// ---------------------------------------------------------------------
// Tool-output diagnostic parsers
// ---------------------------------------------------------------------

/// Parse `ruff --output-format=json` output into diagnostics.
///
/// Severity is derived from the rule-code prefix: `F` → error, `E`/`W` →
/// warning, `I` → info, anything else → warning.
pub fn parse_ruff_json(raw: &str) -> Result<Vec<Diagnostic>> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ForgeIdeError::ParseError {
        parser_name: "ruff".into(),
        raw_output_length: raw.len(),
    })?;

    let entries = value.as_array().ok_or_else(|| ForgeIdeError::ParseError {
        parser_name: "ruff".into(),
        raw_output_length: raw.len(),
    })?;

    let mut diagnostics = Vec::new();
    for entry in entries {
        let file = entry.get("filename").and_then(Value::as_str).unwrap_or("").to_string();
        let code = entry.get("code").and_then(Value::as_str).map(str::to_string);
        let message = entry.get("message").and_then(Value::as_str).unwrap_or("").to_string();
        let line = entry
            .get("location")
            .and_then(|l| l.get("row"))
            .and_then(Value::as_u64)
            .unwrap_or(1) as usize;
        let column = entry
            .get("location")
            .and_then(|l| l.get("column"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let severity = match code.as_deref().and_then(|c| c.chars().next()) {
            Some('F') => Severity::Error,
            Some('E') | Some('W') => Severity::Warning,
            Some('I') => Severity::Info,
            _ => Severity::Warning,
        };

        diagnostics.push(Diagnostic {
            file,
            line: line.max(1),
            column,
            message,
            severity,
            code,
        });
    }
    Ok(diagnostics)
}

/// Parse `pyright --outputjson` output into diagnostics.
pub fn parse_pyright_json(raw: &str) -> Result<Vec<Diagnostic>> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ForgeIdeError::ParseError {
        parser_name: "pyright".into(),
        raw_output_length: raw.len(),
    })?;

    let entries = value
        .get("generalDiagnostics")
        .and_then(Value::as_array)
        .ok_or_else(|| ForgeIdeError::ParseError {
            parser_name: "pyright".into(),
            raw_output_length: raw.len(),
        })?;

    let mut diagnostics = Vec::new();
    for entry in entries {
        let file = entry.get("file").and_then(Value::as_str).unwrap_or("").to_string();
        let message = entry.get("message").and_then(Value::as_str).unwrap_or("").to_string();
        let severity = match entry.get("severity").and_then(Value::as_str).unwrap_or("error") {
            "warning" => Severity::Warning,
            "information" => Severity::Info,
            "hint" => Severity::Hint,
            _ => Severity::Error,
        };
        let line = entry
            .get("range")
            .and_then(|r| r.get("start"))
            .and_then(|s| s.get("line"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
            + 1;
        let column = entry
            .get("range")
            .and_then(|r| r.get("start"))
            .and_then(|s| s.get("character"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        diagnostics.push(Diagnostic {
            file,
            line,
            column,
            message,
            severity,
            code: entry.get("rule").and_then(Value::as_str).map(str::to_string),
        });
    }
    Ok(diagnostics)
}

/// Build a single-entry diagnostic list from a best-effort syntax scan of
/// Python source: unbalanced brackets/parens/braces. There is no Python
/// grammar available to run a real parse, so this only catches the most
/// common structural error; anything it can't characterize yields an
/// empty list rather than a false positive.
pub fn parse_python_ast_errors(file_path: &str, source: &str) -> Vec<Diagnostic> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '(' | '[' | '{' => stack.push((ch, idx + 1)),
                ')' | ']' | '}' => {
                    if stack.pop().is_none() {
                        return vec![Diagnostic {
                            file: file_path.to_string(),
                            line: idx + 1,
                            column: 0,
                            message: format!("unmatched closing '{ch}'"),
                            severity: Severity::Error,
                            code: None,
                        }];
                    }
                }
                _ => {}
            }
        }
    }
    if let Some((ch, line)) = stack.last() {
        return vec![Diagnostic {
            file: file_path.to_string(),
            line: *line,
            column: 0,
            message: format!("unclosed '{ch}'"),
            severity: Severity::Error,
            code: None,
        }];
    }
    Vec::new()
}

/// Return the set of stdlib module names this parser's resolver uses, for
/// callers that want to pass their own superset via `resolve_imports`.
pub fn default_stdlib_set() -> BTreeSet<String> {
    STDLIB_MODULES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_symbols_finds_functions_and_classes() {
        let source = "def foo():\n    pass\n\n\nclass Bar:\n    def method(self):\n        pass\n";
        let symbols = extract_symbols(source);
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"foo"));
        assert!(names.contains(&"Bar"));
        assert!(names.contains(&"method"));
        let method = symbols.iter().find(|s| s.name == "method").unwrap();
        assert_eq!(method.parent.as_deref(), Some("Bar"));
        assert_eq!(method.kind, "method");
    }

    #[test]
    fn extract_symbols_skips_private_names() {
        let source = "def _hidden():\n    pass\n";
        assert!(extract_symbols(source).is_empty());
    }

    #[test]
    fn extract_symbols_classifies_constants_vs_variables() {
        let source = "MAX_SIZE = 100\ncounter = 0\n";
        let symbols = extract_symbols(source);
        let max_size = symbols.iter().find(|s| s.name == "MAX_SIZE").unwrap();
        assert_eq!(max_size.kind, "constant");
        let counter = symbols.iter().find(|s| s.name == "counter").unwrap();
        assert_eq!(counter.kind, "variable");
    }

    #[test]
    fn resolve_imports_classifies_stdlib_and_third_party() {
        let source = "import os\nimport requests\n";
        let files = HashSet::new();
        let infos = resolve_imports(source, "app/main.py", &files, None);
        assert!(infos.iter().any(|i| i.module == "os" && i.is_stdlib));
        assert!(infos.iter().any(|i| i.module == "requests" && !i.is_stdlib));
    }

    #[test]
    fn resolve_imports_resolves_workspace_module() {
        let source = "from app.helpers import thing\n";
        let mut files = HashSet::new();
        files.insert("app/helpers.py".to_string());
        let infos = resolve_imports(source, "app/main.py", &files, None);
        let info = infos.iter().find(|i| i.module == "app.helpers").unwrap();
        assert_eq!(info.resolved_path.as_deref(), Some("app/helpers.py"));
    }

    #[test]
    fn resolve_imports_handles_relative_from_dot_import() {
        let source = "from . import sibling\n";
        let mut files = HashSet::new();
        files.insert("app/sibling.py".to_string());
        let infos = resolve_imports(source, "app/main.py", &files, None);
        assert!(infos.iter().any(|i| i.resolved_path.as_deref() == Some("app/sibling.py")));
    }

    #[test]
    fn parse_ruff_json_maps_severity_by_code_prefix() {
        let raw = r#"[{"filename":"a.py","code":"F401","message":"unused import","location":{"row":3,"column":1}}]"#;
        let diags = parse_ruff_json(raw).unwrap();
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].line, 3);
    }

    #[test]
    fn parse_pyright_json_maps_native_severities() {
        let raw = r#"{"generalDiagnostics":[{"file":"a.py","message":"bad","severity":"warning","range":{"start":{"line":4,"character":2}}}]}"#;
        let diags = parse_pyright_json(raw).unwrap();
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].line, 5);
    }

    #[test]
    fn parse_python_ast_errors_detects_unclosed_bracket() {
        let diags = parse_python_ast_errors("a.py", "def foo(:\n    pass\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn parse_python_ast_errors_returns_empty_on_balanced_source() {
        let diags = parse_python_ast_errors("a.py", "def foo():\n    return [1, 2]\n");
        assert!(diags.is_empty());
    }
}
