//! Full-file / line-range / named-symbol extraction.

use std::path::Path;

use crate::contracts::{LineRange, Snippet};
use crate::diagnostics::detect_language;
use crate::errors::{ForgeIdeError, Result};
use crate::lang::{python_intel, ts_intel};

/// Extensions that are refused outright as binary.
const BINARY_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".webp", ".pdf", ".zip", ".tar", ".gz",
    ".bz2", ".7z", ".exe", ".dll", ".so", ".dylib", ".bin", ".woff", ".woff2", ".ttf", ".eot",
    ".mp3", ".mp4", ".avi", ".mov", ".pyc", ".class", ".jar", ".wasm",
];

/// Default cap on readable file size in bytes, layered from
/// [`crate::config`] (built-in default, `forge_ide.toml`, then
/// `FORGE_IDE_MAX_READ_BYTES`) when the caller doesn't pass one explicitly.
pub fn default_max_read_bytes() -> u64 {
    crate::config::global().max_read_bytes
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub content: String,
    pub line_count: usize,
    pub size_bytes: u64,
    pub language: String,
    pub encoding: String,
}

fn has_binary_extension(path: &Path) -> bool {
    let name = path.to_string_lossy().to_ascii_lowercase();
    BINARY_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Read a whole file, subject to the binary/size/null-byte guards described
/// Encoding is detected: a UTF-8 BOM is treated as `utf-8-sig`;
/// otherwise UTF-8 is tried first, falling back to latin-1 (a lossless
/// byte-to-codepoint mapping, so this never fails).
pub fn read_file(path: &Path, max_bytes: Option<u64>) -> Result<ReadResult> {
    let max_bytes = max_bytes.unwrap_or_else(default_max_read_bytes);

    if has_binary_extension(path) {
        return Err(ForgeIdeError::ParseError {
            parser_name: "reader".into(),
            raw_output_length: 0,
        });
    }

    let metadata = std::fs::metadata(path)?;
    if metadata.len() > max_bytes {
        return Err(ForgeIdeError::ParseError {
            parser_name: "reader".into(),
            raw_output_length: metadata.len() as usize,
        });
    }

    let bytes = std::fs::read(path)?;
    if bytes.iter().take(512).any(|b| *b == 0) {
        return Err(ForgeIdeError::ParseError {
            parser_name: "reader".into(),
            raw_output_length: bytes.len(),
        });
    }

    let (content, encoding) = decode(&bytes);
    let line_count = content.lines().count();
    let language = detect_language(&path.to_string_lossy()).to_string();

    Ok(ReadResult {
        content,
        line_count,
        size_bytes: metadata.len(),
        language,
        encoding,
    })
}

fn decode(bytes: &[u8]) -> (String, String) {
    if let Some(stripped) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return (String::from_utf8_lossy(stripped).into_owned(), "utf-8-sig".to_string());
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), "utf-8".to_string()),
        Err(_) => {
            // True ISO-8859-1: every byte maps directly to the codepoint of
            // the same value, so this is lossless and cannot fail. Not
            // `WINDOWS_1252` — that remaps 0x80-0x9F to curly quotes/euro/etc.
            let content: String = bytes.iter().map(|&b| b as char).collect();
            (content, "latin-1".to_string())
        }
    }
}

/// Extract an inclusive, 1-based `[start, end]` line range. `end` is
/// clamped to the file's actual line count with no error.
pub fn read_range(content: &str, start: usize, end: usize) -> Result<Snippet> {
    if start < 1 {
        return Err(ForgeIdeError::Internal("start must be >= 1".into()));
    }
    if end < start {
        return Err(ForgeIdeError::Internal("end must be >= start".into()));
    }

    let lines: Vec<&str> = content.lines().collect();
    let end = end.min(lines.len().max(1));
    let start = start.min(end.max(1));

    let slice = if lines.is_empty() {
        String::new()
    } else {
        lines[(start - 1)..end.min(lines.len())].join("\n")
    };

    Ok(Snippet {
        path: String::new(),
        range: LineRange { start, end },
        content: slice,
    })
}

/// Locate a named top-level (or class-nested) symbol and return its
/// extracted snippet with a 1-based inclusive line range. Dispatches on
/// detected language: Python uses AST-derived symbols, TS/JS uses
/// regex + balanced-brace matching.
pub fn read_symbol(content: &str, language: &str, name: &str) -> Result<Snippet> {
    let symbols = match language {
        "python" => python_intel::extract_symbols(content),
        "typescript" | "typescriptreact" | "javascript" | "javascriptreact" => {
            ts_intel::extract_symbols(content)
        }
        _ => Vec::new(),
    };

    let symbol = symbols
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ForgeIdeError::Internal(format!("symbol '{name}' not found")))?;

    let lines: Vec<&str> = content.lines().collect();
    let end = symbol.end_line.min(lines.len());
    let slice = if lines.is_empty() || symbol.start_line == 0 {
        String::new()
    } else {
        lines[(symbol.start_line - 1)..end].join("\n")
    };

    Ok(Snippet {
        path: String::new(),
        range: LineRange {
            start: symbol.start_line,
            end,
        },
        content: slice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_file_rejects_binary_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, b"\x89PNG").unwrap();
        assert!(read_file(&path, None).is_err());
    }

    #[test]
    fn read_file_rejects_null_byte_in_first_512() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weird.txt");
        let mut data = vec![b'a'; 10];
        data.push(0);
        std::fs::write(&path, &data).unwrap();
        assert!(read_file(&path, None).is_err());
    }

    #[test]
    fn read_file_rejects_oversize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, vec![b'a'; 200]).unwrap();
        assert!(read_file(&path, Some(100)).is_err());
    }

    #[test]
    fn read_file_detects_utf8_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.txt");
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"hello");
        std::fs::write(&path, &data).unwrap();
        let result = read_file(&path, None).unwrap();
        assert_eq!(result.encoding, "utf-8-sig");
        assert_eq!(result.content, "hello");
    }

    #[test]
    fn read_range_clamps_end_without_error() {
        let content = "a\nb\nc";
        let snippet = read_range(content, 1, 100).unwrap();
        assert_eq!(snippet.range.end, 3);
        assert_eq!(snippet.content, "a\nb\nc");
    }

    #[test]
    fn read_range_rejects_start_below_one() {
        assert!(read_range("a\nb", 0, 1).is_err());
    }

    #[test]
    fn read_file_decodes_non_utf8_as_true_latin1() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        // 0x93 is U+0093 (a C1 control code) in true Latin-1, but a curly
        // left-quote in Windows-1252 — this distinguishes the two mappings.
        std::fs::write(&path, [b'a', 0x93, b'b']).unwrap();
        let result = read_file(&path, None).unwrap();
        assert_eq!(result.encoding, "latin-1");
        assert_eq!(result.content, "a\u{93}b");
    }

    #[test]
    fn read_symbol_extracts_python_function() {
        let content = "def foo():\n    return 1\n\n\ndef bar():\n    return 2\n";
        let snippet = read_symbol(content, "python", "bar").unwrap();
        assert!(snippet.content.starts_with("def bar"));
    }
}
