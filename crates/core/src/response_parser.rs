//! Classify and clean raw LLM responses before they reach the patch
//! engine.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Diff,
    FullContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub kind: ResponseKind,
    pub raw: String,
    pub cleaned: String,
}

/// `"diff"` requires all three unified-diff markers to be present
/// somewhere in the text: a `--- <path>` line, a `+++ <path>` line, and
/// at least one `@@ -<num>` hunk header. Anything short of that is
/// treated as full file content.
pub fn classify_response(text: &str) -> ResponseKind {
    let has_minus_header = text.lines().any(|l| l.starts_with("--- "));
    let has_plus_header = text.lines().any(|l| l.starts_with("+++ "));
    let hunk_re = Regex::new(r"^@@ -\d+").unwrap();
    let has_hunk = text.lines().any(|l| hunk_re.is_match(l));

    if has_minus_header && has_plus_header && has_hunk {
        ResponseKind::Diff
    } else {
        ResponseKind::FullContent
    }
}

/// Strip exactly one outermost fenced code block (```lang\n...\n```` or
/// plain ```\n...\n````). Inner fences are left untouched. Text with no
/// fence, or an unterminated fence, is returned unchanged.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return text.to_string();
    };
    let first_newline = match after_open.find('\n') {
        Some(idx) => idx,
        None => return text.to_string(),
    };
    let body_and_rest = &after_open[first_newline + 1..];

    let Some(close_idx) = body_and_rest.rfind("```") else {
        return text.to_string();
    };

    body_and_rest[..close_idx].trim_end_matches('\n').to_string()
}

pub fn ensure_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

/// Strip fences, classify what's left, and (for full-content responses
/// only) ensure a trailing newline.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let stripped = strip_fences(raw);
    let kind = classify_response(&stripped);
    let cleaned = match kind {
        ResponseKind::FullContent => ensure_trailing_newline(&stripped),
        ResponseKind::Diff => stripped,
    };
    ParsedResponse {
        kind,
        raw: raw.to_string(),
        cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_requires_all_three_markers() {
        let diff = "--- a/foo.py\n+++ b/foo.py\n@@ -1,2 +1,2 @@\n-old\n+new\n";
        assert_eq!(classify_response(diff), ResponseKind::Diff);

        let missing_hunk = "--- a/foo.py\n+++ b/foo.py\nsome text\n";
        assert_eq!(classify_response(missing_hunk), ResponseKind::FullContent);
    }

    #[test]
    fn strip_fences_removes_one_outer_fence_with_lang_tag() {
        let text = "```python\ndef f():\n    pass\n```";
        assert_eq!(strip_fences(text), "def f():\n    pass");
    }

    #[test]
    fn strip_fences_preserves_inner_fences() {
        let text = "```markdown\nHere:\n```code```\nmore\n```";
        let stripped = strip_fences(text);
        assert!(stripped.contains("```code```"));
    }

    #[test]
    fn strip_fences_leaves_unfenced_text_untouched() {
        assert_eq!(strip_fences("plain text"), "plain text");
    }

    #[test]
    fn parse_response_ensures_trailing_newline_for_full_content() {
        let parsed = parse_response("print('hi')");
        assert_eq!(parsed.kind, ResponseKind::FullContent);
        assert!(parsed.cleaned.ends_with('\n'));
    }

    #[test]
    fn parse_response_classifies_diff_after_stripping_fences() {
        let raw = "```diff\n--- a/x.py\n+++ b/x.py\n@@ -1,1 +1,1 @@\n-a\n+b\n```";
        let parsed = parse_response(raw);
        assert_eq!(parsed.kind, ResponseKind::Diff);
    }
}
