//! Response parser & build helpers, the parts that compose across
//! crate boundaries.
//!
//! `classify_response` / `strip_fences` / `parse_response` live in
//! [`forge_ide_core::response_parser`] because they are pure text
//! transforms with no patch-engine dependency. `apply_response` and
//! `run_and_summarise`, by contrast, each compose a lower leaf crate
//! (the patch engine, the runner) with core — and since the patch engine
//! and runner both depend on core rather than the reverse, that
//! composition has to live here, one level above both.

use forge_ide_core::log_parser::CommandOutput;
use forge_ide_core::response_parser::{parse_response, ResponseKind};

/// Outcome of [`apply_response`]: either the file's new full content, or
/// — when a diff response's hunks didn't match — the cleaned diff text
/// handed back for the caller to re-request as full content.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AppliedResponse {
    Applied {
        content: String,
        hunks_applied: usize,
        insertions: usize,
        deletions: usize,
    },
    Conflict {
        cleaned_diff: String,
        had_conflict: bool,
    },
}

/// `parse_response(llm_text)`, then: full content is returned as-is;
/// a diff is applied against `original` with the patch engine's default
/// fuzz, falling back to the cleaned diff text with `had_conflict=true`
/// on a [`forge_ide_apply_patch::PatchError::Conflict`] so the caller's
/// contract is to re-request the file as full content.
pub fn apply_response(original: &str, llm_text: &str, path: &str) -> AppliedResponse {
    let parsed = parse_response(llm_text);
    match parsed.kind {
        ResponseKind::FullContent => AppliedResponse::Applied {
            content: parsed.cleaned,
            hunks_applied: 0,
            insertions: 0,
            deletions: 0,
        },
        ResponseKind::Diff => match forge_ide_apply_patch::apply_patch(original, &parsed.cleaned, path, 3) {
            Ok(result) => AppliedResponse::Applied {
                content: result.content,
                hunks_applied: result.hunks_applied,
                insertions: result.stats.insertions,
                deletions: result.stats.deletions,
            },
            Err(_) => AppliedResponse::Conflict {
                cleaned_diff: parsed.cleaned,
                had_conflict: true,
            },
        },
    }
}

/// Adapter so a [`forge_ide_runner::RunResult`] plus the command that
/// produced it can be fed to [`forge_ide_core::log_parser::auto_summarise`]
/// without the runner crate needing to depend on the log-parser module
/// (or vice versa).
struct RunOutput<'a> {
    command: &'a str,
    result: &'a forge_ide_runner::RunResult,
}

impl CommandOutput for RunOutput<'_> {
    fn command(&self) -> &str {
        self.command
    }

    fn stdout(&self) -> &str {
        &self.result.stdout
    }

    fn stderr(&self) -> &str {
        &self.result.stderr
    }
}

/// `run(cmd, ...)` then `auto_summarise` over the result.
pub async fn run_and_summarise(
    cmd: &str,
    timeout_s: u64,
    cwd: Option<&str>,
) -> forge_ide_runner::Result<(forge_ide_runner::RunResult, serde_json::Value)> {
    let result = forge_ide_runner::run(cmd, timeout_s, cwd, None, None).await?;
    let summary = forge_ide_core::log_parser::auto_summarise(&RunOutput { command: cmd, result: &result });
    Ok((result, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn apply_response_passes_full_content_through() {
        let applied = apply_response("old\n", "new content\n", "file.py");
        assert_eq!(
            applied,
            AppliedResponse::Applied {
                content: "new content\n".to_string(),
                hunks_applied: 0,
                insertions: 0,
                deletions: 0,
            }
        );
    }

    #[test]
    fn apply_response_applies_a_matching_diff() {
        let original = "line 1\nline 2\nline 3\n";
        let diff = "--- a/file.py\n+++ b/file.py\n@@ -1,3 +1,3 @@\n line 1\n-line 2\n+line two\n line 3\n";
        let applied = apply_response(original, diff, "file.py");
        match applied {
            AppliedResponse::Applied { content, hunks_applied, .. } => {
                assert_eq!(content, "line 1\nline two\nline 3\n");
                assert_eq!(hunks_applied, 1);
            }
            AppliedResponse::Conflict { .. } => panic!("expected a clean apply"),
        }
    }

    #[test]
    fn apply_response_falls_back_to_cleaned_diff_on_conflict() {
        let original = "completely different content\n";
        let diff = "--- a/file.py\n+++ b/file.py\n@@ -10,3 +10,3 @@\n line 1\n-line 2\n+line two\n line 3\n";
        let applied = apply_response(original, diff, "file.py");
        match applied {
            AppliedResponse::Conflict { had_conflict, .. } => assert!(had_conflict),
            AppliedResponse::Applied { .. } => panic!("expected a conflict"),
        }
    }
}
