//! Diagnostic merging and the closed extension → language table.

use std::collections::BTreeMap;

use crate::contracts::{Diagnostic, Severity};

/// Closed extension → language table. Anything not listed here maps to
/// `"unknown"`.
const EXTENSION_LANGUAGE: &[(&str, &str)] = &[
    (".py", "python"),
    (".pyi", "python"),
    (".pyw", "python"),
    (".ts", "typescript"),
    (".tsx", "typescriptreact"),
    (".js", "javascript"),
    (".jsx", "javascriptreact"),
    (".json", "json"),
    (".md", "markdown"),
    (".yaml", "yaml"),
    (".yml", "yaml"),
    (".toml", "toml"),
    (".html", "html"),
    (".htm", "html"),
    (".css", "css"),
    (".scss", "scss"),
    (".sql", "sql"),
    (".sh", "shell"),
    (".bash", "shell"),
    (".ps1", "powershell"),
    (".xml", "xml"),
    (".txt", "plaintext"),
    (".cfg", "ini"),
    (".ini", "ini"),
    (".env", "dotenv"),
    (".rs", "rust"),
    (".go", "go"),
    (".java", "java"),
    (".c", "c"),
    (".cpp", "cpp"),
    (".h", "c"),
    (".hpp", "cpp"),
];

/// Detect a programming language from a file path's extension.
///
/// Extensionless filenames `Dockerfile` and `Makefile` (case-insensitive
/// basename match) are special-cased, since the closed table otherwise
/// only keys on extension. Returns `"unknown"` for anything else.
pub fn detect_language(path: &str) -> &'static str {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if basename.eq_ignore_ascii_case("dockerfile") {
        return "dockerfile";
    }
    if basename.eq_ignore_ascii_case("makefile") {
        return "makefile";
    }

    match basename.rfind('.') {
        None => "unknown",
        Some(dot_idx) => {
            let ext = basename[dot_idx..].to_ascii_lowercase();
            EXTENSION_LANGUAGE
                .iter()
                .find(|(k, _)| *k == ext)
                .map(|(_, v)| *v)
                .unwrap_or("unknown")
        }
    }
}

/// Aggregated diagnostics grouped by file, with severity tallies.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticReport {
    pub files: BTreeMap<String, Vec<Diagnostic>>,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub hint_count: usize,
}

/// Merge any number of diagnostic lists into one report, grouping by file
/// path and tallying severities.
pub fn merge_diagnostics(diag_lists: &[&[Diagnostic]]) -> DiagnosticReport {
    let mut report = DiagnosticReport::default();
    for list in diag_lists {
        for diag in *list {
            report
                .files
                .entry(diag.file.clone())
                .or_default()
                .push(diag.clone());
            match diag.severity {
                Severity::Error => report.error_count += 1,
                Severity::Warning => report.warning_count += 1,
                Severity::Info => report.info_count += 1,
                Severity::Hint => report.hint_count += 1,
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_extensions() {
        assert_eq!(detect_language("src/main.py"), "python");
        assert_eq!(detect_language("app/page.tsx"), "typescriptreact");
        assert_eq!(detect_language("styles/app.scss"), "scss");
        assert_eq!(detect_language(".env"), "dotenv");
    }

    #[test]
    fn unknown_extension_maps_to_unknown() {
        assert_eq!(detect_language("binary.exe"), "unknown");
        assert_eq!(detect_language("no_extension"), "unknown");
    }

    #[test]
    fn special_cases_dockerfile_and_makefile() {
        assert_eq!(detect_language("Dockerfile"), "dockerfile");
        assert_eq!(detect_language("backend/Makefile"), "makefile");
    }

    #[test]
    fn merge_diagnostics_tallies_by_severity() {
        let a = Diagnostic {
            file: "a.py".into(),
            line: 1,
            column: 0,
            message: "bad".into(),
            severity: Severity::Error,
            code: None,
        };
        let b = Diagnostic {
            file: "a.py".into(),
            line: 2,
            column: 0,
            message: "meh".into(),
            severity: Severity::Warning,
            code: None,
        };
        let report = merge_diagnostics(&[&[a, b]]);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.files["a.py"].len(), 2);
    }
}
