//! Unified-diff patch engine and diff generator.
//!
//! Parsing is handled by [`parser`]; this module owns fuzzy hunk matching,
//! cumulative-offset application across multi-hunk patches, and rendering
//! fresh diffs from an old/new string pair via `similar`.

mod parser;

use std::fmt::Write as _;

pub use parser::{parse_unified_diff, Hunk, ParseError};

use forge_ide_core::ForgeIdeError;
use similar::{ChangeTag, TextDiff};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("patch conflict in {file_path} at hunk {hunk_index}")]
    Conflict {
        file_path: String,
        hunk_index: usize,
        expected: String,
        actual: String,
    },
}

impl From<PatchError> for ForgeIdeError {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::Parse(p) => ForgeIdeError::ParseError {
                parser_name: "unified_diff".to_string(),
                raw_output_length: p.to_string().len(),
            },
            PatchError::Conflict {
                file_path,
                hunk_index,
                expected,
                actual,
            } => ForgeIdeError::PatchConflict {
                file_path,
                hunk_index,
                expected,
                actual,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;

pub const DEFAULT_FUZZ: usize = 3;

/// Net line-count effect of applying a patch: raw `+`/`-` tallies, not the
/// post-application delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub insertions: usize,
    pub deletions: usize,
}

/// Result of a single-file `apply_patch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub content: String,
    pub stats: PatchStats,
    /// Count of hunks successfully spliced in, incremented once per hunk as
    /// it's applied rather than recovered by re-parsing the diff afterward.
    pub hunks_applied: usize,
}

/// Find the 0-based line index in `lines` where `hunk.old_lines` best
/// matches, trying the exact expected position first, then alternating
/// offsets `±1, ±2, ... ±fuzz`. A pure insertion (no old-side lines)
/// always matches at `min(old_start - 1, lines.len())`.
fn match_hunk(lines: &[String], hunk: &Hunk, old_start: usize, fuzz: usize) -> Option<usize> {
    if hunk.old_lines.is_empty() {
        return Some(old_start.saturating_sub(1).min(lines.len()));
    }

    let base = old_start.saturating_sub(1);
    let try_at = |pos: usize| -> bool {
        pos + hunk.old_lines.len() <= lines.len() && lines[pos..pos + hunk.old_lines.len()] == hunk.old_lines[..]
    };

    if try_at(base) {
        return Some(base);
    }
    for delta in 1..=fuzz {
        if base >= delta {
            let pos = base - delta;
            if try_at(pos) {
                return Some(pos);
            }
        }
        let pos = base + delta;
        if try_at(pos) {
            return Some(pos);
        }
    }
    None
}

/// Apply a unified diff to `content`, returning the patched text and raw
/// insertion/deletion counts. `fuzz` bounds how many lines a hunk's
/// expected position may drift before matching gives up.
pub fn apply_patch(content: &str, diff_text: &str, path: &str, fuzz: usize) -> Result<PatchResult> {
    let hunks = parse_unified_diff(diff_text)?;
    let had_trailing_newline = content.ends_with('\n') || content.is_empty();
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let mut stats = PatchStats::default();
    let mut hunks_applied = 0usize;
    let mut offset: i64 = 0;

    for (idx, hunk) in hunks.iter().enumerate() {
        let adjusted_start = (hunk.old_start as i64 + offset).max(1) as usize;
        let Some(pos) = match_hunk(&lines, hunk, adjusted_start, fuzz) else {
            let actual_end = (adjusted_start.saturating_sub(1) + hunk.old_lines.len()).min(lines.len());
            let actual_start = adjusted_start.saturating_sub(1).min(lines.len());
            return Err(PatchError::Conflict {
                file_path: path.to_string(),
                hunk_index: idx,
                expected: hunk.old_lines.join("\n"),
                actual: lines[actual_start..actual_end].join("\n"),
            });
        };

        let old_len = hunk.old_lines.len();
        lines.splice(pos..pos + old_len, hunk.new_lines.iter().cloned());
        offset += hunk.new_lines.len() as i64 - old_len as i64;
        stats.insertions += hunk.additions;
        stats.deletions += hunk.removals;
        hunks_applied += 1;
    }

    let mut patched = lines.join("\n");
    if had_trailing_newline && !patched.is_empty() {
        patched.push('\n');
    }

    Ok(PatchResult { content: patched, stats, hunks_applied })
}

/// One file's worth of patch input for [`apply_multi_patch`].
pub struct MultiPatchInput {
    pub path: String,
    pub content: String,
    pub diff: String,
}

/// Apply a batch of per-file patches in order, propagating the first
/// conflict immediately. Callers needing all-or-nothing semantics must
/// snapshot the filesystem themselves before calling this.
pub fn apply_multi_patch(inputs: &[MultiPatchInput], fuzz: usize) -> Result<Vec<(String, PatchResult)>> {
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let result = apply_patch(&input.content, &input.diff, &input.path, fuzz)?;
        results.push((input.path.clone(), result));
    }
    Ok(results)
}

/// A generated unified diff: the forward-slashed path plus rendered hunk
/// bodies and raw insertion/deletion counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDiff {
    pub path: String,
    pub hunks: Vec<String>,
    pub insertions: usize,
    pub deletions: usize,
}

fn forward_slashed(path: &str) -> String {
    path.replace('\\', "/")
}

/// Diff `old` against `new`, normalizing CRLF to LF on both sides first.
/// Hunk text uses standard `@@ -a,b +c,d @@` headers with `context_lines`
/// lines of context on either side of each change group.
pub fn generate_diff(old: &str, new: &str, path: &str, context_lines: usize) -> GeneratedDiff {
    let old_norm = old.replace("\r\n", "\n");
    let new_norm = new.replace("\r\n", "\n");
    let fwd_path = forward_slashed(path);

    let diff = TextDiff::from_lines(&old_norm, &new_norm);
    let mut hunks = Vec::new();
    let mut insertions = 0usize;
    let mut deletions = 0usize;

    for group in diff.grouped_ops(context_lines) {
        let mut old_start = None;
        let mut old_count = 0usize;
        let mut new_start = None;
        let mut new_count = 0usize;
        let mut body = String::new();

        for op in &group {
            for change in diff.iter_changes(op) {
                let (old_idx, new_idx) = (change.old_index(), change.new_index());
                match change.tag() {
                    ChangeTag::Delete => {
                        if old_start.is_none() {
                            old_start = old_idx.map(|i| i + 1);
                        }
                        old_count += 1;
                        deletions += 1;
                        let _ = write!(body, "-{}\n", change.value().trim_end_matches('\n'));
                    }
                    ChangeTag::Insert => {
                        if new_start.is_none() {
                            new_start = new_idx.map(|i| i + 1);
                        }
                        new_count += 1;
                        insertions += 1;
                        let _ = write!(body, "+{}\n", change.value().trim_end_matches('\n'));
                    }
                    ChangeTag::Equal => {
                        if old_start.is_none() {
                            old_start = old_idx.map(|i| i + 1);
                        }
                        if new_start.is_none() {
                            new_start = new_idx.map(|i| i + 1);
                        }
                        old_count += 1;
                        new_count += 1;
                        let _ = write!(body, " {}\n", change.value().trim_end_matches('\n'));
                    }
                }
            }
        }

        let header = format!(
            "@@ -{},{} +{},{} @@\n",
            old_start.unwrap_or(0),
            old_count,
            new_start.unwrap_or(0),
            new_count
        );
        hunks.push(format!("{header}{body}"));
    }

    GeneratedDiff {
        path: fwd_path,
        hunks,
        insertions,
        deletions,
    }
}

/// Render a [`GeneratedDiff`] back to canonical unified-diff text. Every
/// line has trailing whitespace stripped so the sanitiser's byte-identical
/// guarantee holds across runs.
pub fn diff_to_text(diff: &GeneratedDiff) -> String {
    let mut out = format!("--- a/{0}\n+++ b/{0}\n", diff.path);
    for hunk in &diff.hunks {
        for line in hunk.lines() {
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out
}

/// One file's worth of input for [`generate_multi_diff`].
pub struct MultiDiffInput {
    pub path: String,
    pub old: String,
    pub new: String,
}

pub fn generate_multi_diff(inputs: &[MultiDiffInput], context_lines: usize) -> Vec<GeneratedDiff> {
    inputs
        .iter()
        .map(|i| generate_diff(&i.old, &i.new, &i.path, context_lines))
        .collect()
}
