//! TypeScript/JavaScript symbol extraction and tool-output diagnostic
//! parsers.

use regex::Regex;
use serde_json::Value;

use super::Symbol;
use crate::contracts::{Diagnostic, Severity};
use crate::errors::{ForgeIdeError, Result};

/// Parse `tsc` output lines of the form
/// `file(L,C): error TS####: message`.
pub fn parse_tsc_output(raw: &str) -> Vec<Diagnostic> {
    let re = Regex::new(r"^(.+?)\((\d+),(\d+)\):\s*(error|warning|info)\s+TS(\d+):\s*(.+)$").unwrap();
    let mut diagnostics = Vec::new();
    for line in raw.lines() {
        if let Some(caps) = re.captures(line.trim_end()) {
            let severity = match &caps[4] {
                "warning" => Severity::Warning,
                "info" => Severity::Info,
                _ => Severity::Error,
            };
            diagnostics.push(Diagnostic {
                file: caps[1].to_string(),
                line: caps[2].parse().unwrap_or(1),
                column: caps[3].parse().unwrap_or(0),
                message: caps[6].to_string(),
                severity,
                code: Some(format!("TS{}", &caps[5])),
            });
        }
    }
    diagnostics
}

/// Parse standard ESLint `-f json` output:
/// `[{filePath, messages:[{ruleId,severity,message,line,column}]}]`.
/// `severity=2` → error, `1` → warning.
pub fn parse_eslint_json(raw: &str) -> Result<Vec<Diagnostic>> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ForgeIdeError::ParseError {
        parser_name: "eslint".into(),
        raw_output_length: raw.len(),
    })?;
    let files = value.as_array().ok_or_else(|| ForgeIdeError::ParseError {
        parser_name: "eslint".into(),
        raw_output_length: raw.len(),
    })?;

    let mut diagnostics = Vec::new();
    for file_entry in files {
        let file = file_entry.get("filePath").and_then(Value::as_str).unwrap_or("").to_string();
        let messages = file_entry.get("messages").and_then(Value::as_array).cloned().unwrap_or_default();
        for msg in messages {
            let severity = match msg.get("severity").and_then(Value::as_u64).unwrap_or(1) {
                2 => Severity::Error,
                _ => Severity::Warning,
            };
            diagnostics.push(Diagnostic {
                file: file.clone(),
                line: msg.get("line").and_then(Value::as_u64).unwrap_or(1) as usize,
                column: msg.get("column").and_then(Value::as_u64).unwrap_or(0) as usize,
                message: msg.get("message").and_then(Value::as_str).unwrap_or("").to_string(),
                severity,
                code: msg.get("ruleId").and_then(Value::as_str).map(str::to_string),
            });
        }
    }
    Ok(diagnostics)
}

/// Extract top-level declarations by regex match at line start, with the
/// end line found by balanced-brace counting (bare `const`/`let`/`var`
/// forms with no brace body are terminated at the first trailing `;` or
/// end of the logical statement).
pub fn extract_symbols(source: &str) -> Vec<Symbol> {
    let decl_re = Regex::new(
        r"^(export\s+)?(default\s+)?(abstract\s+class|class|interface|type|enum|function|async\s+function|const|let|var)\s+([A-Za-z_$][\w$]*)",
    )
    .unwrap();

    let lines: Vec<&str> = source.lines().collect();
    let mut symbols = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") {
            continue;
        }
        if let Some(caps) = decl_re.captures(trimmed) {
            let keyword = caps[3].to_string();
            let name = caps[4].to_string();
            let kind = match keyword.as_str() {
                "class" | "abstract class" => "class",
                "interface" => "interface",
                "type" => "type",
                "enum" => "enum",
                "function" | "async function" => "function",
                _ => "variable",
            };

            let end_line = if line.contains('{') {
                brace_end(&lines, idx)
            } else {
                semicolon_end(&lines, idx)
            };

            symbols.push(Symbol {
                name,
                kind: kind.to_string(),
                start_line: idx + 1,
                end_line,
                parent: None,
            });
        }
    }

    symbols
}

fn brace_end(lines: &[&str], start_idx: usize) -> usize {
    let mut depth = 0i32;
    let mut seen_open = false;
    for (idx, line) in lines.iter().enumerate().skip(start_idx) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            return idx + 1;
        }
    }
    lines.len()
}

fn semicolon_end(lines: &[&str], start_idx: usize) -> usize {
    for (idx, line) in lines.iter().enumerate().skip(start_idx) {
        if line.trim_end().ends_with(';') {
            return idx + 1;
        }
    }
    start_idx + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tsc_output_extracts_line_and_code() {
        let raw = "src/app.ts(10,5): error TS2322: Type 'string' is not assignable to type 'number'.";
        let diags = parse_tsc_output(raw);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 10);
        assert_eq!(diags[0].code.as_deref(), Some("TS2322"));
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn parse_eslint_json_maps_severity_numbers() {
        let raw = r#"[{"filePath":"a.ts","messages":[{"ruleId":"no-unused-vars","severity":2,"message":"x","line":1,"column":1}]}]"#;
        let diags = parse_eslint_json(raw).unwrap();
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn extract_symbols_finds_class_with_brace_end() {
        let source = "export class Foo {\n  bar() {\n    return 1;\n  }\n}\n";
        let symbols = extract_symbols(source);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "Foo");
        assert_eq!(symbols[0].end_line, 5);
    }

    #[test]
    fn extract_symbols_finds_bare_const_terminated_by_semicolon() {
        let source = "const x =\n  1 + 2;\n";
        let symbols = extract_symbols(source);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].end_line, 2);
    }
}
