//! Tagged error kinds with structured detail.
//!
//! Every fallible core operation eventually resolves to one of the five
//! kinds here. Each crate that needs its own local error type (sandbox
//! resolution, patch application, subprocess execution) defines a
//! `thiserror` enum of its own and converts into [`ForgeIdeError`] via
//! `#[from]` at the boundary where it crosses into core — see
//! `From<forge_ide_sandbox::SandboxViolation>` below for the pattern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The five tagged error kinds the runtime ever raises.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum ForgeIdeError {
    #[error("sandbox violation: {reason} (path={path})")]
    SandboxViolation {
        path: String,
        attempted_path: Option<String>,
        root: Option<String>,
        reason: String,
    },

    #[error("tool '{tool_name}' timed out after {timeout_ms}ms")]
    ToolTimeout { tool_name: String, timeout_ms: u64 },

    #[error("failed to parse {parser_name} output ({raw_output_length} bytes)")]
    ParseError {
        parser_name: String,
        raw_output_length: usize,
    },

    #[error("patch conflict in {file_path} at hunk {hunk_index}")]
    PatchConflict {
        file_path: String,
        hunk_index: usize,
        expected: String,
        actual: String,
    },

    #[error("tool '{tool_name}' not found; available: {}", available_tools.join(", "))]
    ToolNotFound {
        tool_name: String,
        available_tools: Vec<String>,
    },

    /// Internal detail that doesn't fit one of the five tagged kinds above
    /// (I/O failures, JSON decode failures at the registry boundary, etc).
    /// Wrapped rather than surfaced as its own kind so external callers
    /// only ever need to match on five tags.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<forge_ide_sandbox::SandboxViolation> for ForgeIdeError {
    fn from(v: forge_ide_sandbox::SandboxViolation) -> Self {
        ForgeIdeError::SandboxViolation {
            path: v.path,
            attempted_path: v.attempted_path,
            root: v.root,
            reason: v.reason,
        }
    }
}

impl From<std::io::Error> for ForgeIdeError {
    fn from(e: std::io::Error) -> Self {
        ForgeIdeError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ForgeIdeError {
    fn from(e: serde_json::Error) -> Self {
        ForgeIdeError::Internal(e.to_string())
    }
}

impl ForgeIdeError {
    /// Stable machine-readable tag for the error `kind` field in a
    /// [`crate::contracts::ToolResponse`] envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ForgeIdeError::SandboxViolation { .. } => "SandboxViolation",
            ForgeIdeError::ToolTimeout { .. } => "ToolTimeout",
            ForgeIdeError::ParseError { .. } => "ParseError",
            ForgeIdeError::PatchConflict { .. } => "PatchConflict",
            ForgeIdeError::ToolNotFound { .. } => "ToolNotFound",
            ForgeIdeError::Internal(_) => "Internal",
        }
    }

    /// Structured detail fields as a JSON object, for embedding in the
    /// `error` field of a failed `ToolResponse`.
    pub fn detail(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub type Result<T> = std::result::Result<T, ForgeIdeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_is_stable_for_tool_not_found() {
        let e = ForgeIdeError::ToolNotFound {
            tool_name: "frobnicate".into(),
            available_tools: vec!["read_file".into(), "write_file".into()],
        };
        assert_eq!(e.kind(), "ToolNotFound");
        assert!(e.to_string().contains("frobnicate"));
    }

    #[test]
    fn sandbox_violation_converts_from_sandbox_crate() {
        let v = forge_ide_sandbox::SandboxViolation {
            path: "../etc/passwd".into(),
            attempted_path: None,
            root: Some("/work".into()),
            reason: "path traversal ('..') not allowed".into(),
        };
        let e: ForgeIdeError = v.into();
        assert_eq!(e.kind(), "SandboxViolation");
        assert!(e.to_string().contains("traversal"));
    }
}
