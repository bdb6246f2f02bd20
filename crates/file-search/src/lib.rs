//! Code content search: an external `rg --json` fast path with an
//! in-process fallback walker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use forge_ide_core::contracts::Match;
use regex::Regex;
use serde_json::Value;

const MAX_SNIPPET_CHARS: usize = 200;

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "tar", "gz", "bz2", "7z",
    "exe", "dll", "so", "dylib", "bin", "woff", "woff2", "ttf", "eot", "mp3", "mp4", "avi", "mov",
    "pyc", "class", "jar", "wasm",
];

const DEFAULT_SKIP_SET: &[&str] = forge_ide_core::workspace::DEFAULT_SKIP_SET;

fn is_binary_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Translate a glob pattern (`*`, `**`, `?`) into an anchored regex.
/// `**` matches across path separators, `*` stops at `/`.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}

/// One compiled `.gitignore` line. Explicit negation (`!pattern`) is
/// unsupported and silently skipped per the basic-gitignore-parser scope.
struct IgnoreRule {
    regex: Regex,
    dir_only: bool,
}

fn load_gitignore(root: &Path) -> Vec<IgnoreRule> {
    let Ok(text) = std::fs::read_to_string(root.join(".gitignore")) else {
        return Vec::new();
    };
    let mut rules = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let dir_only = trimmed.ends_with('/');
        let pattern = trimmed.trim_end_matches('/');
        let glob_pattern = if pattern.contains('/') {
            pattern.trim_start_matches('/').to_string()
        } else {
            format!("**/{pattern}")
        };
        if let Some(regex) = glob_to_regex(&glob_pattern) {
            rules.push(IgnoreRule { regex, dir_only });
        }
    }
    rules
}

fn is_gitignored(rules: &[IgnoreRule], rel_path: &str, is_dir: bool) -> bool {
    rules.iter().any(|r| {
        if r.dir_only && !is_dir {
            return false;
        }
        r.regex.is_match(rel_path)
    })
}

fn should_skip_dir(name: &str) -> bool {
    DEFAULT_SKIP_SET.contains(&name)
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    let gitignore = load_gitignore(root);
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().to_string();
            let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");

            if file_type.is_dir() {
                if should_skip_dir(&name) || is_gitignored(&gitignore, &rel, true) {
                    continue;
                }
                stack.push(path);
            } else if file_type.is_file() {
                if is_binary_path(&path) || is_gitignored(&gitignore, &rel, false) {
                    continue;
                }
                out.push(path);
            }
        }
    }
    out
}

/// Build the line-content match regex, case-(in)sensitively, literal or
/// regex depending on `is_regex`.
fn build_pattern_regex(pattern: &str, is_regex: bool, case_sensitive: bool) -> Result<Regex, regex::Error> {
    let escaped;
    let body = if is_regex {
        pattern
    } else {
        escaped = regex::escape(pattern);
        &escaped
    };
    let prefix = if case_sensitive { "" } else { "(?i)" };
    Regex::new(&format!("{prefix}{body}"))
}

fn truncate_snippet(line: &str) -> String {
    if line.chars().count() <= MAX_SNIPPET_CHARS {
        line.to_string()
    } else {
        line.chars().take(MAX_SNIPPET_CHARS).collect()
    }
}

/// In-process fallback: walk the workspace (honoring the default skip
/// set, a basic `.gitignore`, and a binary-extension list), matching
/// `pattern` against every text-file line.
fn search_inprocess(
    root: &Path,
    pattern: &str,
    glob: Option<&str>,
    is_regex: bool,
    max_results: usize,
    context_lines: usize,
    case_sensitive: bool,
) -> (Vec<Match>, bool) {
    let Ok(re) = build_pattern_regex(pattern, is_regex, case_sensitive) else {
        return (Vec::new(), false);
    };
    let glob_re = glob.and_then(glob_to_regex);

    let mut matches = Vec::new();
    let mut truncated = false;

    'files: for path in walk_files(root) {
        let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if let Some(ref gre) = glob_re {
            if !gre.is_match(&rel) {
                continue;
            }
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        for (idx, line) in lines.iter().enumerate() {
            let Some(m) = re.find(line) else { continue };
            if matches.len() >= max_results {
                truncated = true;
                break 'files;
            }
            let before_start = idx.saturating_sub(context_lines);
            let after_end = (idx + 1 + context_lines).min(lines.len());
            matches.push(Match {
                path: rel.clone(),
                line: idx + 1,
                column: m.start(),
                snippet: truncate_snippet(line),
                context_before: lines[before_start..idx].iter().map(|s| s.to_string()).collect(),
                context_after: lines[idx + 1..after_end].iter().map(|s| s.to_string()).collect(),
            });
        }
    }

    (matches, truncated)
}

/// Try `rg --json` if it is on `PATH`. Returns `None` if `rg` is missing
/// or the invocation fails to spawn/parse, in which case the caller
/// should fall back to [`search_inprocess`].
fn search_external(
    root: &Path,
    pattern: &str,
    glob: Option<&str>,
    is_regex: bool,
    max_results: usize,
    context_lines: usize,
    case_sensitive: bool,
) -> Option<(Vec<Match>, bool)> {
    let rg = which::which("rg").ok()?;

    let mut cmd = std::process::Command::new(rg);
    cmd.arg("--json").arg("-C").arg(context_lines.to_string());
    if !is_regex {
        cmd.arg("-F");
    }
    if !case_sensitive {
        cmd.arg("-i");
    }
    if let Some(g) = glob {
        cmd.arg("-g").arg(g);
    }
    cmd.arg("-e").arg(pattern).arg(root);

    let output = cmd.output().ok()?;
    if !output.status.success() && output.stdout.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);

    let mut matches = Vec::new();
    let mut truncated = false;
    let mut current_path = String::new();
    // (line_number, text, is_match)
    let mut file_lines: Vec<(u64, String, bool)> = Vec::new();

    let flush = |path: &str, lines: &[(u64, String, bool)], matches: &mut Vec<Match>| {
        for (i, (num, text, is_match)) in lines.iter().enumerate() {
            if !is_match {
                continue;
            }
            let before_start = i.saturating_sub(context_lines);
            let after_end = (i + 1 + context_lines).min(lines.len());
            matches.push(Match {
                path: path.to_string(),
                line: *num as usize,
                column: 0,
                snippet: truncate_snippet(text),
                context_before: lines[before_start..i].iter().map(|(_, t, _)| t.clone()).collect(),
                context_after: lines[i + 1..after_end].iter().map(|(_, t, _)| t.clone()).collect(),
            });
        }
    };

    for line in text.lines() {
        let Ok(value) = serde_json::from_str::<Value>(line) else { continue };
        let Some(kind) = value.get("type").and_then(Value::as_str) else { continue };
        match kind {
            "begin" => {
                file_lines.clear();
                current_path = value
                    .pointer("/data/path/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if let Ok(stripped) = Path::new(&current_path).strip_prefix(root) {
                    current_path = stripped.to_string_lossy().replace('\\', "/");
                }
            }
            "match" | "context" => {
                let line_number = value.pointer("/data/line_number").and_then(Value::as_u64).unwrap_or(0);
                let raw = value.pointer("/data/lines/text").and_then(Value::as_str).unwrap_or("");
                file_lines.push((line_number, raw.trim_end_matches('\n').to_string(), kind == "match"));
            }
            "end" => {
                if matches.len() < max_results {
                    flush(&current_path, &file_lines, &mut matches);
                }
                if matches.len() >= max_results {
                    matches.truncate(max_results);
                    truncated = true;
                }
            }
            _ => {}
        }
    }

    Some((matches, truncated))
}

/// Search `root` for `pattern`, preferring an external `rg --json`
/// invocation and falling back to the in-process walker.
pub fn search(
    root: &Path,
    pattern: &str,
    glob: Option<&str>,
    is_regex: bool,
    max_results: usize,
    context_lines: usize,
    case_sensitive: bool,
) -> (Vec<Match>, bool) {
    if let Some(result) = search_external(root, pattern, glob, is_regex, max_results, context_lines, case_sensitive) {
        return result;
    }
    search_inprocess(root, pattern, glob, is_regex, max_results, context_lines, case_sensitive)
}

/// Async entry point for I/O-bound callers (the registry dispatch path):
/// runs [`search`] on a blocking-pool thread so the external `rg`
/// subprocess and the walker's filesystem calls never stall the runtime.
pub async fn search_async(
    root: PathBuf,
    pattern: String,
    glob: Option<String>,
    is_regex: bool,
    max_results: usize,
    context_lines: usize,
    case_sensitive: bool,
) -> (Vec<Match>, bool) {
    tokio::task::spawn_blocking(move || {
        search(&root, &pattern, glob.as_deref(), is_regex, max_results, context_lines, case_sensitive)
    })
    .await
    .unwrap_or((Vec::new(), false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn glob_to_regex_matches_double_star_and_single_star() {
        let re = glob_to_regex("**/*.py").unwrap();
        assert!(re.is_match("a/b/c.py"));
        assert!(re.is_match("c.py"));
        assert!(!re.is_match("c.js"));
    }

    #[test]
    fn search_inprocess_finds_literal_match_with_context() {
        let dir = tempdir().unwrap();
        write(dir.path(), "app.py", "line1\nneedle here\nline3\n");
        let (matches, truncated) = search_inprocess(dir.path(), "needle", None, false, 100, 1, true);
        assert_eq!(matches.len(), 1);
        assert!(!truncated);
        assert_eq!(matches[0].context_before, vec!["line1".to_string()]);
        assert_eq!(matches[0].context_after, vec!["line3".to_string()]);
    }

    #[test]
    fn search_inprocess_respects_gitignore() {
        let dir = tempdir().unwrap();
        write(dir.path(), ".gitignore", "ignored/\n");
        write(dir.path(), "ignored/secret.py", "needle\n");
        write(dir.path(), "kept.py", "needle\n");
        let (matches, _) = search_inprocess(dir.path(), "needle", None, false, 100, 0, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "kept.py");
    }

    #[test]
    fn search_inprocess_skips_default_skip_set_and_binary_extensions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/index.js", "needle\n");
        write(dir.path(), "asset.png", "needle\n");
        write(dir.path(), "real.py", "needle\n");
        let (matches, _) = search_inprocess(dir.path(), "needle", None, false, 100, 0, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "real.py");
    }

    #[test]
    fn search_inprocess_honors_glob_filter() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "needle\n");
        write(dir.path(), "b.js", "needle\n");
        let (matches, _) = search_inprocess(dir.path(), "needle", Some("**/*.py"), false, 100, 0, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "a.py");
    }

    #[test]
    fn search_inprocess_caps_results_and_marks_truncated() {
        let dir = tempdir().unwrap();
        write(dir.path(), "many.py", "needle\n".repeat(10).as_str());
        let (matches, truncated) = search_inprocess(dir.path(), "needle", None, false, 3, 0, true);
        assert_eq!(matches.len(), 3);
        assert!(truncated);
    }

    #[test]
    fn search_inprocess_case_insensitive_when_requested() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "NEEDLE\n");
        let (matches, _) = search_inprocess(dir.path(), "needle", None, false, 100, 0, false);
        assert_eq!(matches.len(), 1);
    }
}
