//! Pytest / npm-test / build / generic output → structured summaries.
//!
//! Each parser here is a pure string-in → record-out function: no I/O, no
//! side effects, byte-identical output for byte-identical input.

use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_GENERIC_LINES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PytestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub warnings: usize,
    pub duration_s: String,
    pub failures: Vec<TestFailure>,
    pub collection_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NpmTestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub failures: Vec<TestFailure>,
    pub suite: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildIssue {
    pub file: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildSummary {
    pub success: bool,
    pub errors: Vec<BuildIssue>,
    pub warnings: Vec<BuildIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GenericSummary {
    pub line_count: usize,
    pub head: Vec<String>,
    pub tail: Vec<String>,
    pub error_lines: Vec<String>,
    pub truncated: bool,
}

/// Duck-typed getter over whatever the caller's run-result type is, so
/// `auto_summarise` doesn't need to depend on `forge-ide-exec`'s `RunResult`.
pub trait CommandOutput {
    fn command(&self) -> &str;
    fn stdout(&self) -> &str;
    fn stderr(&self) -> &str;
}

/// Parse pytest output: summary totals line, per-failure blocks, and
/// collection errors.
pub fn summarise_pytest(text: &str) -> PytestSummary {
    let mut summary = PytestSummary::default();

    let summary_line_re = Regex::new(r"=+\s*(.+?)\s+in\s+([\d.]+)s\s*=+").unwrap();
    let token_re = Regex::new(r"(\d+)\s+(passed|failed|errors?|skipped|warnings?|deselected)").unwrap();

    if let Some(caps) = summary_line_re.captures(text) {
        summary.duration_s = caps[2].to_string();
        for token in token_re.captures_iter(&caps[1]) {
            let count: usize = token[1].parse().unwrap_or(0);
            match &token[2] {
                "passed" => summary.passed = count,
                "failed" => summary.failed = count,
                "error" | "errors" => summary.errors = count,
                "skipped" => summary.skipped = count,
                "warning" | "warnings" => summary.warnings = count,
                _ => {}
            }
        }
    }
    summary.total = summary.passed + summary.failed + summary.errors + summary.skipped;

    let failed_block_re = Regex::new(r"(?m)^FAILED\s+(\S+::\S+)\s*-\s*(.+)$").unwrap();
    for caps in failed_block_re.captures_iter(text) {
        summary.failures.push(TestFailure {
            name: caps[1].to_string(),
            message: caps[2].trim().to_string(),
        });
    }
    if summary.failures.is_empty() {
        let simple_re = Regex::new(r"(?m)^FAILED\s+(\S+)\s*-\s*(.+)$").unwrap();
        for caps in simple_re.captures_iter(text) {
            summary.failures.push(TestFailure {
                name: caps[1].to_string(),
                message: caps[2].trim().to_string(),
            });
        }
    }

    let collect_re = Regex::new(r"(?m)^ERROR\s+collecting\s+(\S+)").unwrap();
    for caps in collect_re.captures_iter(text) {
        summary.collection_errors.push(caps[1].to_string());
    }

    summary
}

/// Parse npm-test output: vitest's totals line first, falling back to
/// jest's `Tests: F failed, P passed, T total` line.
pub fn summarise_npm_test(text: &str) -> NpmTestSummary {
    let mut summary = NpmTestSummary::default();

    let vitest_totals_re = Regex::new(r"(?m)^\s*Tests\s+(.+?passed.*?\(\d+\))\s*$").unwrap();
    let jest_totals_re =
        Regex::new(r"Tests:\s*(?:(\d+)\s*failed,\s*)?(?:(\d+)\s*passed,\s*)?(\d+)\s*total").unwrap();

    let mut matched_vitest = false;
    for line in text.lines() {
        if line.trim_start().starts_with("Test Files") || line.trim_start().starts_with("Test Suites") {
            continue;
        }
        if line.trim_start().starts_with("Tests:") {
            // Jest-style line; handled by the jest fallback below.
            continue;
        }
        if let Some(caps) = vitest_totals_re.captures(line) {
            let passed_re = Regex::new(r"(\d+)\s+passed").unwrap();
            let failed_re = Regex::new(r"(\d+)\s+failed").unwrap();
            let total_re = Regex::new(r"\((\d+)\)").unwrap();
            if let Some(p) = passed_re.captures(&caps[1]) {
                summary.passed = p[1].parse().unwrap_or(0);
            }
            if let Some(f) = failed_re.captures(&caps[1]) {
                summary.failed = f[1].parse().unwrap_or(0);
            }
            if let Some(t) = total_re.captures(&caps[1]) {
                summary.total = t[1].parse().unwrap_or(0);
            }
            summary.suite = "vitest".to_string();
            matched_vitest = true;
            break;
        }
    }

    if !matched_vitest {
        if let Some(caps) = jest_totals_re.captures(text) {
            summary.failed = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            summary.passed = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            summary.total = caps[3].parse().unwrap_or(0);
            summary.suite = "jest".to_string();
        }
    }

    let vitest_fail_re = Regex::new(r"(?m)^\s*(?:×|FAIL)\s+(.+)$").unwrap();
    for caps in vitest_fail_re.captures_iter(text) {
        summary.failures.push(TestFailure {
            name: caps[1].trim().to_string(),
            message: String::new(),
        });
    }
    if summary.failures.is_empty() {
        let jest_fail_re = Regex::new(r"(?m)^\s*●\s+(.+)$").unwrap();
        for caps in jest_fail_re.captures_iter(text) {
            summary.failures.push(TestFailure {
                name: caps[1].trim().to_string(),
                message: String::new(),
            });
        }
    }

    summary
}

/// Parse combined stdout+stderr build output into structured file:line
/// diagnostics plus generic `ERROR:`/`WARNING:` lines, deduplicating
/// generic messages already captured by the structured pattern.
pub fn summarise_build(combined: &str) -> BuildSummary {
    let mut summary = BuildSummary::default();

    let structured_re =
        Regex::new(r"(?m)^(.+?):(\d+)(?::(\d+))?:\s*(error|warning):\s*(.+)$").unwrap();
    let mut seen_messages = std::collections::HashSet::new();

    for caps in structured_re.captures_iter(combined) {
        let message = caps[5].trim().to_string();
        seen_messages.insert(message.clone());
        let issue = BuildIssue {
            file: Some(caps[1].to_string()),
            line: caps[2].parse().ok(),
            column: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            message,
            is_error: &caps[4] == "error",
        };
        if issue.is_error {
            summary.errors.push(issue);
        } else {
            summary.warnings.push(issue);
        }
    }

    let generic_re = Regex::new(r"(?m)^(ERROR|WARNING):\s*(.+)$").unwrap();
    for caps in generic_re.captures_iter(combined) {
        let message = caps[2].trim().to_string();
        if seen_messages.contains(&message) {
            continue;
        }
        let issue = BuildIssue {
            file: None,
            line: None,
            column: None,
            message,
            is_error: &caps[1] == "ERROR",
        };
        if issue.is_error {
            summary.errors.push(issue);
        } else {
            summary.warnings.push(issue);
        }
    }

    summary.success = summary.errors.is_empty();
    summary
}

/// Fall-back generic summary: head/tail windowing plus error-line scan.
pub fn summarise_generic(text: &str) -> GenericSummary {
    let lines: Vec<&str> = text.lines().collect();
    let line_count = lines.len();
    let error_re = Regex::new(r"(?i)error|fail|exception|traceback").unwrap();

    let mut summary = GenericSummary {
        line_count,
        ..Default::default()
    };

    if line_count <= 2 * MAX_GENERIC_LINES {
        summary.head = lines.iter().map(|s| s.to_string()).collect();
    } else {
        summary.head = lines[..MAX_GENERIC_LINES].iter().map(|s| s.to_string()).collect();
        summary.tail = lines[line_count - MAX_GENERIC_LINES..]
            .iter()
            .map(|s| s.to_string())
            .collect();
        summary.truncated = true;
    }

    for line in &lines {
        if error_re.is_match(line) {
            summary.error_lines.push(line.to_string());
        }
    }

    summary
}

/// Detect which parser a command's output should go through, by matching
/// an ordered prefix table against the lowercased, trimmed command.
pub fn detect_parser(cmd: &str) -> &'static str {
    let lower = cmd.trim().to_ascii_lowercase();
    const PYTEST_PREFIXES: &[&str] = &["pytest", "python -m pytest", "python3 -m pytest"];
    const NPM_PREFIXES: &[&str] = &["npm test", "npm run test", "npx vitest", "npx jest"];
    const BUILD_PREFIXES: &[&str] = &["npm run build", "cargo build", "make", "tsc", "go build"];

    if PYTEST_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return "pytest";
    }
    if NPM_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return "npm";
    }
    if BUILD_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return "build";
    }
    "generic"
}

/// Dispatch `result` (anything implementing [`CommandOutput`]) to the
/// right parser based on `detect_parser(result.command())`, returning the
/// summary serialized to JSON (the four summary shapes differ, so the
/// uniform return type is a JSON value rather than an enum with payload
/// variants the caller would need to match on anyway).
pub fn auto_summarise(result: &dyn CommandOutput) -> serde_json::Value {
    let combined = format!("{}\n{}", result.stdout(), result.stderr());
    match detect_parser(result.command()) {
        "pytest" => serde_json::to_value(summarise_pytest(&combined)).unwrap(),
        "npm" => serde_json::to_value(summarise_npm_test(&combined)).unwrap(),
        "build" => serde_json::to_value(summarise_build(&combined)).unwrap(),
        _ => serde_json::to_value(summarise_generic(&combined)).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pytest_summary_end_to_end_scenario() {
        let input = "FAILED tests/t.py::test_a - x != y\nFAILED tests/t.py::test_b - RuntimeError\n===== 2 failed, 8 passed in 1.20s =====\n";
        let summary = summarise_pytest(input);
        assert_eq!(summary.passed, 8);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total, 10);
        assert_eq!(summary.duration_s, "1.20");
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].name, "tests/t.py::test_a");
    }

    #[test]
    fn pytest_summary_is_deterministic() {
        let input = "===== 3 passed in 0.5s =====\n";
        assert_eq!(summarise_pytest(input), summarise_pytest(input));
    }

    #[test]
    fn npm_test_prefers_vitest_totals_over_jest_line() {
        let input = "Test Files  1 passed (1)\n Tests  3 passed (3)\n";
        let summary = summarise_npm_test(input);
        assert_eq!(summary.suite, "vitest");
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn npm_test_falls_back_to_jest() {
        let input = "Tests: 1 failed, 4 passed, 5 total\n";
        let summary = summarise_npm_test(input);
        assert_eq!(summary.suite, "jest");
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 5);
    }

    #[test]
    fn build_summary_dedupes_generic_against_structured() {
        let input = "src/a.rs:10:5: error: mismatched types\nERROR: mismatched types\nWARNING: unused import\n";
        let summary = summarise_build(input);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(!summary.success);
    }

    #[test]
    fn build_summary_warnings_alone_do_not_fail() {
        let input = "WARNING: deprecated API\n";
        let summary = summarise_build(input);
        assert!(summary.success);
    }

    #[test]
    fn generic_summary_windows_head_and_tail_when_long() {
        let lines: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        let text = lines.join("\n");
        let summary = summarise_generic(&text);
        assert!(summary.truncated);
        assert_eq!(summary.head.len(), 50);
        assert_eq!(summary.tail.len(), 50);
    }

    #[test]
    fn detect_parser_matches_ordered_prefixes() {
        assert_eq!(detect_parser("pytest -v"), "pytest");
        assert_eq!(detect_parser("npm test"), "npm");
        assert_eq!(detect_parser("cargo build --release"), "build");
        assert_eq!(detect_parser("my_custom_tool"), "generic");
    }
}
