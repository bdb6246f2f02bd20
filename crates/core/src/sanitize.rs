//! Stable sort keys, noise stripping, and secret redaction.
//!
//! Everything here is a pure function over strings/records: given the same
//! input it returns byte-identical output, so two runs of the same command
//! on the same machine compare equal once their output has passed through
//! here.

use regex::Regex;
use std::sync::OnceLock;

use crate::contracts::{Diagnostic, Match, Severity};
use crate::lang::Symbol;

/// Replace `\` with `/` everywhere. Applied before any other pass so
/// downstream regexes only ever see one separator convention.
pub fn normalize_path_separators(text: &str) -> String {
    text.replace('\\', "/")
}

/// Strip a workspace-root prefix (in either separator convention) from
/// every occurrence in `text`, leaving a workspace-relative path behind.
pub fn normalise_paths(text: &str, workspace_root: &str) -> String {
    let root_fwd = workspace_root.replace('\\', "/");
    let root_back = workspace_root.replace('/', "\\");
    let mut out = text.replace(&root_back, "");
    out = out.replace(&root_fwd, "");
    out
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
        )
        .unwrap()
    })
}

fn pid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:pid|process)\s*[:=]\s*\d+").unwrap())
}

fn tmpdir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:/tmp/[^\s'\u0022]*|/var/folders/[^\s'\u0022]*?/T/[^\s'\u0022]*|[A-Za-z]:\\[^\s'\u0022]*?\\AppData\\Local\\Temp\\[^\s'\u0022]*|[A-Za-z]:\\[^\s'\u0022]*?\\Windows\\Temp\\[^\s'\u0022]*)",
        )
        .unwrap()
    })
}

/// Which closed secret shape a [`SecretMatch`] was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    OpenAiKey,
    GitHubToken,
    AwsAccessKey,
    BearerToken,
    KeyValue,
}

/// A span in the input text recognised as one of the closed set of secret
/// shapes. `start`/`end` are byte offsets, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMatch {
    pub kind: SecretKind,
    pub start: usize,
    pub end: usize,
}

/// One regex per closed secret shape, checked in a fixed order so the same
/// input always classifies into the same `SecretKind` regardless of overlap.
fn secret_patterns() -> &'static [(SecretKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(SecretKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (SecretKind::OpenAiKey, Regex::new(r"sk-[A-Za-z0-9]{20,}").unwrap()),
            (SecretKind::GitHubToken, Regex::new(r"gh[pousr]_[A-Za-z0-9]{20,}").unwrap()),
            (SecretKind::AwsAccessKey, Regex::new(r"AKIA[A-Z0-9]{16}").unwrap()),
            (
                SecretKind::BearerToken,
                Regex::new(r"(?i)bearer\s+[a-z0-9._\-]{16,}").unwrap(),
            ),
            (
                SecretKind::KeyValue,
                Regex::new(r"(?i)(?:api[_-]?key|apikey|token|secret)\s*[:=]\s*[a-z0-9._\-]{8,}").unwrap(),
            ),
        ]
    })
}

/// Find every non-overlapping secret span in `text`, in the fixed pattern
/// order above, sorted by start offset. A purely non-mutating scan — callers
/// that only need a yes/no answer should use [`has_secrets`] instead.
pub fn find_secrets(text: &str) -> Vec<SecretMatch> {
    let mut matches: Vec<SecretMatch> = Vec::new();
    for (kind, re) in secret_patterns() {
        for m in re.find_iter(text) {
            if matches.iter().any(|existing| m.start() < existing.end && existing.start < m.end()) {
                continue;
            }
            matches.push(SecretMatch {
                kind: *kind,
                start: m.start(),
                end: m.end(),
            });
        }
    }
    matches.sort_by_key(|m| m.start);
    matches
}

/// Whether `text` contains any of the closed set of secret shapes.
pub fn has_secrets(text: &str) -> bool {
    secret_patterns().iter().any(|(_, re)| re.is_match(text))
}

/// Replace every recognised secret span with `[REDACTED]`.
pub fn redact(text: &str) -> String {
    let matches = find_secrets(text);
    if matches.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in matches {
        out.push_str(&text[cursor..m.start]);
        out.push_str("[REDACTED]");
        cursor = m.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Replace ISO-8601 / common log timestamps with the literal `[timestamp]`.
pub fn strip_timestamps(text: &str) -> String {
    timestamp_re().replace_all(text, "[timestamp]").into_owned()
}

/// Replace `pid=N` / `PID: N` / `process=N` style markers with `[pid]`.
pub fn strip_pids(text: &str) -> String {
    pid_re().replace_all(text, "[pid]").into_owned()
}

/// Replace tmpdir paths (`/tmp/...`, `/var/folders/.../T/...`, Windows
/// `AppData\Local\Temp` / `Windows\Temp`) with `[tmpdir]`.
pub fn strip_tmpdirs(text: &str) -> String {
    tmpdir_re().replace_all(text, "[tmpdir]").into_owned()
}

/// Apply the full noise-stripping pipeline in order: timestamps, then
/// pids, then tmpdirs, then path normalization. Idempotent: running this
/// on its own output returns the same string.
pub fn sanitise_output(text: &str) -> String {
    let text = strip_timestamps(text);
    let text = strip_pids(&text);
    let text = strip_tmpdirs(&text);
    normalize_path_separators(&text)
}

/// Sort file paths by their lower-cased, forward-slash-normalized form.
pub fn sort_paths(paths: &mut [String]) {
    paths.sort_by_key(|p| normalize_path_separators(p).to_ascii_lowercase());
}

/// Sort search matches by `(path, line, column)`.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| (&a.path, a.line, a.column).cmp(&(&b.path, b.line, b.column)));
}

/// Sort diagnostics by `(file, line, severity-rank, message)`.
pub fn sort_diagnostics(diags: &mut [Diagnostic]) {
    diags.sort_by(|a, b| {
        (&a.file, a.line, a.severity.rank(), &a.message).cmp(&(
            &b.file,
            b.line,
            b.severity.rank(),
            &b.message,
        ))
    });
}

/// Sort symbols by `start_line` (stable — ties keep their relative order).
pub fn sort_symbols(symbols: &mut [Symbol]) {
    symbols.sort_by_key(|s| s.start_line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitise_output_is_idempotent() {
        let input = "2024-01-05T10:22:31Z pid=1234 wrote /tmp/abc123/out.log";
        let once = sanitise_output(input);
        let twice = sanitise_output(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_timestamps_pids_and_tmpdirs() {
        let input = "2024-01-05T10:22:31Z pid=1234 wrote /tmp/abc123/out.log";
        let sanitised = sanitise_output(input);
        assert_eq!(sanitised, "[timestamp] [pid] wrote [tmpdir]");
    }

    #[test]
    fn strips_windows_temp_paths() {
        let input = r"wrote C:\Users\bob\AppData\Local\Temp\xyz\out.log";
        let sanitised = strip_tmpdirs(input);
        assert!(sanitised.contains("[tmpdir]"));
    }

    #[test]
    fn normalise_paths_strips_workspace_root_both_separators() {
        let text = "Error in /work/src/main.py and C:\\work\\src\\main.py";
        let out = normalise_paths(text, "/work");
        assert!(!out.contains("/work/"));
    }

    #[test]
    fn redact_masks_bearer_and_api_key() {
        let text = "Authorization: Bearer abcdef0123456789ZZ, api_key=sk-abcdef0123456789";
        let out = redact(text);
        assert!(!out.contains("abcdef0123456789ZZ"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn find_secrets_classifies_each_closed_shape() {
        let text = "sk-abcdefghij0123456789 ghp_abcdefghij0123456789 AKIAABCDEFGHIJ123456 Bearer abcdefghij0123456789 apikey=supersecret1 token=supersecret2 secret=supersecret3";
        let found = find_secrets(text);
        let kinds: Vec<SecretKind> = found.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&SecretKind::OpenAiKey));
        assert!(kinds.contains(&SecretKind::GitHubToken));
        assert!(kinds.contains(&SecretKind::AwsAccessKey));
        assert!(kinds.contains(&SecretKind::BearerToken));
        assert!(kinds.iter().filter(|k| **k == SecretKind::KeyValue).count() >= 3);
    }

    #[test]
    fn has_secrets_is_false_for_clean_text() {
        assert!(!has_secrets("no secrets in this line"));
        assert!(has_secrets("token=abcdefgh12345678"));
    }

    #[test]
    fn redact_replaces_every_span_without_disturbing_surrounding_text() {
        let text = "prefix AKIAABCDEFGHIJ123456 suffix";
        let out = redact(text);
        assert_eq!(out, "prefix [REDACTED] suffix");
    }

    #[test]
    fn sort_paths_is_case_insensitive_and_separator_normalized() {
        let mut paths = vec!["Zebra.py".to_string(), "apple\\b.py".to_string(), "apple/a.py".to_string()];
        sort_paths(&mut paths);
        assert_eq!(paths, vec!["apple/a.py", "apple\\b.py", "Zebra.py"]);
    }

    #[test]
    fn sort_diagnostics_orders_by_severity_rank_on_tie() {
        let mut diags = vec![
            Diagnostic {
                file: "a.py".into(),
                line: 1,
                column: 0,
                message: "m".into(),
                severity: Severity::Warning,
                code: None,
            },
            Diagnostic {
                file: "a.py".into(),
                line: 1,
                column: 0,
                message: "m".into(),
                severity: Severity::Error,
                code: None,
            },
        ];
        sort_diagnostics(&mut diags);
        assert_eq!(diags[0].severity, Severity::Error);
    }
}
