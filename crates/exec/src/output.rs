//! Subprocess result record and byte-capped truncation.

use serde::{Deserialize, Serialize};

/// Result of a single [`crate::run`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The command as passed to `run`, echoed back so a caller holding only
    /// the result can recover what produced it.
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub killed: bool,
    pub truncated: bool,
}

/// Truncate `text` to `max_bytes`, appending a notice at the byte boundary
/// nearest-but-not-exceeding a UTF-8 char boundary. Returns the (possibly
/// unchanged) text and whether it was cut.
pub fn truncate_output(text: &str, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text.to_string(), false);
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let notice = format!("\n[...truncated at {max_bytes} bytes...]");
    (format!("{}{notice}", &text[..cut]), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truncate_output_leaves_short_text_untouched() {
        let (out, truncated) = truncate_output("hello", 100);
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn truncate_output_cuts_and_appends_notice() {
        let text = "a".repeat(100);
        let (out, truncated) = truncate_output(&text, 10);
        assert!(truncated);
        assert!(out.starts_with(&"a".repeat(10)));
        assert!(out.contains("[...truncated at 10 bytes...]"));
    }

    #[test]
    fn truncate_output_respects_utf8_char_boundaries() {
        let text = "日本語".repeat(20);
        let (out, truncated) = truncate_output(&text, 10);
        assert!(truncated);
        assert!(out.is_char_boundary(out.find('[').unwrap()));
    }
}
