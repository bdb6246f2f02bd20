//! Language intelligence: symbol and import extraction, tool-output
//! diagnostic parsers.

pub mod python_intel;
pub mod ts_intel;

use serde::{Deserialize, Serialize};

/// A named top-level (or class-nested) source entity with a 1-based
/// inclusive line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
    pub parent: Option<String>,
}

/// A resolved or unresolved import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module: String,
    pub names: Vec<String>,
    pub resolved_path: Option<String>,
    pub is_stdlib: bool,
}

pub use crate::diagnostics::DiagnosticReport;
