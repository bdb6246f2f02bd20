//! Frozen request/response/diagnostic/diff record types.
//!
//! All records here are immutable after construction — fields are `pub`
//! for ergonomic construction, but nothing in the core mutates a contract
//! value once built; each call produces a fresh one.

use serde::{Deserialize, Serialize};

/// A 1-based inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// A slice of file content carved out by [`LineRange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Snippet {
    pub path: String,
    pub range: LineRange,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Sort rank used by the sanitiser's diagnostic ordering: error < warning < info < hint.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
            Severity::Hint => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub severity: Severity,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UnifiedDiff {
    pub path: String,
    pub hunks: Vec<String>,
    pub insertions: usize,
    pub deletions: usize,
}

/// A single code-search hit. `snippet` is capped at 200 chars by the
/// searcher before it is ever wrapped in this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Match {
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub snippet: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

// ---------------------------------------------------------------------
// Per-tool request models
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReadFileRequest {
    pub path: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub symbol: Option<String>,
    #[serde(default = "default_max_read_bytes")]
    pub max_bytes: u64,
}

fn default_max_read_bytes() -> u64 {
    crate::config::global().max_read_bytes
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListDirectoryRequest {
    pub path: Option<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchCodeRequest {
    pub pattern: String,
    pub glob: Option<String>,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_context_lines")]
    pub context_lines: usize,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_max_results() -> usize {
    crate::config::global().search_max_results
}

fn default_search_context_lines() -> usize {
    crate::config::global().search_context_lines
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub create_parents: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RunTestsRequest {
    pub command: String,
    pub cwd: Option<String>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

fn default_timeout_s() -> u64 {
    crate::config::global().runner_timeout_s
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CheckSyntaxRequest {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RunCommandRequest {
    pub command: String,
    pub cwd: Option<String>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ApplyPatchRequest {
    pub path: String,
    pub diff: String,
    #[serde(default = "default_fuzz")]
    pub fuzz: usize,
    /// When true, the patched content is written back to disk; otherwise
    /// the handler only reports what applying the hunks would produce.
    #[serde(default)]
    pub write: bool,
}

fn default_fuzz() -> usize {
    crate::config::global().patch_fuzz
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerateDiffRequest {
    pub path: String,
    pub old: String,
    pub new: String,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

fn default_context_lines() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FindRelatedRequest {
    pub target_path: String,
    #[serde(default = "default_max_related")]
    pub max_results: usize,
}

fn default_max_related() -> usize {
    15
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AssembleContextPackRequest {
    pub target_files: Vec<String>,
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: usize,
    #[serde(default = "default_max_related")]
    pub max_related: usize,
}

fn default_budget_tokens() -> usize {
    crate::config::global().context_pack_budget_tokens
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParseResponseRequest {
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ApplyResponseRequest {
    pub path: String,
    pub llm_text: String,
    #[serde(default)]
    pub write: bool,
}

// ---------------------------------------------------------------------
// Tool envelope
// ---------------------------------------------------------------------

/// Uniform request envelope carried over any transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub params: serde_json::Value,
    pub working_dir: String,
}

/// Uniform response envelope: exactly one of `data` / `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl ToolResponse {
    pub fn ok(data: impl Serialize) -> Self {
        ToolResponse {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
        }
    }

    pub fn err(err: &crate::errors::ForgeIdeError) -> Self {
        let mut detail = err.detail();
        if let serde_json::Value::Object(ref mut map) = detail {
            map.insert("kind".to_string(), serde_json::Value::String(err.kind().to_string()));
            map.insert("message".to_string(), serde_json::Value::String(err.to_string()));
        }
        ToolResponse {
            success: false,
            data: None,
            error: Some(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_orders_error_first() {
        assert!(Severity::Error.rank() < Severity::Warning.rank());
        assert!(Severity::Warning.rank() < Severity::Info.rank());
        assert!(Severity::Info.rank() < Severity::Hint.rank());
    }

    #[test]
    fn tool_response_err_embeds_kind_and_message() {
        let err = crate::errors::ForgeIdeError::ToolNotFound {
            tool_name: "x".into(),
            available_tools: vec!["read_file".into()],
        };
        let resp = ToolResponse::err(&err);
        assert!(!resp.success);
        let error = resp.error.unwrap();
        assert_eq!(error["kind"], "ToolNotFound");
    }
}
