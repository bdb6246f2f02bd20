//! Unified-diff text → [`Hunk`] parsing.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed hunk header: {0}")]
    MalformedHeader(String),
    #[error("hunk body line with unrecognized prefix at line {0}: {1:?}")]
    UnrecognizedLine(usize, String),
}

/// One `@@ ... @@` hunk: the parsed header plus every body line bucketed
/// by role. `old_lines`/`new_lines` are the full old-side/new-side
/// sequences (context + changed); `context_before`/`context_after` hold
/// only the context lines before/after the first change is seen, used by
/// fuzzy matching to anchor a hunk even when line numbers have drifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub removals: usize,
    pub additions: usize,
}

/// Parse a `@@ -a[,b] +c[,d] @@` header. Missing counts default to `1`.
fn parse_header(line: &str) -> Result<(usize, usize, usize, usize), ParseError> {
    let body = line
        .strip_prefix("@@ ")
        .and_then(|rest| rest.strip_suffix(" @@").or_else(|| rest.split(" @@").next()))
        .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;

    let mut parts = body.split_whitespace();
    let old_part = parts.next().ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
    let new_part = parts.next().ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;
    Ok((old_start, old_count, new_start, new_count))
}

fn parse_range(part: &str, sigil: char) -> Result<(usize, usize), ParseError> {
    let stripped = part
        .strip_prefix(sigil)
        .ok_or_else(|| ParseError::MalformedHeader(part.to_string()))?;
    let mut pieces = stripped.splitn(2, ',');
    let start: usize = pieces
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::MalformedHeader(part.to_string()))?;
    let count: usize = match pieces.next() {
        Some(c) => c.parse().map_err(|_| ParseError::MalformedHeader(part.to_string()))?,
        None => 1,
    };
    Ok((start, count))
}

fn is_preamble(line: &str) -> bool {
    line.starts_with("--- ")
        || line.starts_with("+++ ")
        || line.starts_with("diff --git")
        || line.starts_with("index ")
        || line == "\\ No newline at end of file"
}

/// Parse a complete unified diff into its hunks, skipping file-header
/// preamble lines wherever they appear.
pub fn parse_unified_diff(text: &str) -> Result<Vec<Hunk>, ParseError> {
    let mut hunks = Vec::new();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        if is_preamble(line) {
            continue;
        }
        if !line.starts_with("@@ ") {
            continue;
        }

        let (old_start, old_count, new_start, new_count) = parse_header(line)?;
        let mut hunk = Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            old_lines: Vec::new(),
            new_lines: Vec::new(),
            context_before: Vec::new(),
            context_after: Vec::new(),
            removals: 0,
            additions: 0,
        };
        let mut seen_change = false;

        while let Some(&next) = lines.peek() {
            if next.starts_with("@@ ") || is_preamble(next) {
                break;
            }
            let body = lines.next().unwrap();
            if body == "\\ No newline at end of file" {
                continue;
            }
            if let Some(rest) = body.strip_prefix('-') {
                hunk.old_lines.push(rest.to_string());
                hunk.removals += 1;
                seen_change = true;
            } else if let Some(rest) = body.strip_prefix('+') {
                hunk.new_lines.push(rest.to_string());
                hunk.additions += 1;
                seen_change = true;
            } else if let Some(rest) = body.strip_prefix(' ') {
                hunk.old_lines.push(rest.to_string());
                hunk.new_lines.push(rest.to_string());
                if seen_change {
                    hunk.context_after.push(rest.to_string());
                } else {
                    hunk.context_before.push(rest.to_string());
                }
            } else if body.is_empty() {
                hunk.old_lines.push(String::new());
                hunk.new_lines.push(String::new());
                if seen_change {
                    hunk.context_after.push(String::new());
                } else {
                    hunk.context_before.push(String::new());
                }
            } else {
                return Err(ParseError::UnrecognizedLine(hunks.len(), body.to_string()));
            }
        }

        hunks.push(hunk);
    }

    Ok(hunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_header_with_explicit_counts() {
        let text = "@@ -1,3 +1,4 @@\n line one\n-line two\n+line two changed\n+inserted\n line three\n";
        let hunks = parse_unified_diff(text).unwrap();
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        assert_eq!(h.old_start, 1);
        assert_eq!(h.new_count, 4);
        assert_eq!(h.removals, 1);
        assert_eq!(h.additions, 2);
        assert_eq!(h.context_before, vec!["line one".to_string()]);
        assert_eq!(h.context_after, vec!["line three".to_string()]);
    }

    #[test]
    fn header_with_missing_counts_defaults_to_one() {
        let text = "@@ -5 +5 @@\n-old\n+new\n";
        let hunks = parse_unified_diff(text).unwrap();
        assert_eq!(hunks[0].old_count, 1);
        assert_eq!(hunks[0].new_count, 1);
    }

    #[test]
    fn skips_preamble_lines() {
        let text = "diff --git a/x.py b/x.py\nindex 111..222 100644\n--- a/x.py\n+++ b/x.py\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        let hunks = parse_unified_diff(text).unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines, vec!["a".to_string()]);
    }

    #[test]
    fn malformed_header_raises_parse_error() {
        let text = "@@ bogus @@\n-a\n+b\n";
        assert!(parse_unified_diff(text).is_err());
    }

    #[test]
    fn multi_hunk_diff_parses_each_independently() {
        let text = "@@ -1,1 +1,1 @@\n-a\n+b\n@@ -10,1 +10,1 @@\n-x\n+y\n";
        let hunks = parse_unified_diff(text).unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].old_start, 10);
    }

    #[test]
    fn no_newline_at_eof_marker_is_ignored() {
        let text = "@@ -1,1 +1,1 @@\n-a\n+b\n\\ No newline at end of file\n";
        let hunks = parse_unified_diff(text).unwrap();
        assert_eq!(hunks[0].new_lines, vec!["b".to_string()]);
    }
}
