//! Error type for command validation and execution failures.

use thiserror::Error;

use forge_ide_core::ForgeIdeError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("command rejected: {reason}")]
    Rejected { command: String, reason: String },
    #[error("failed to spawn process: {0}")]
    Spawn(String),
}

impl From<RunnerError> for ForgeIdeError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Rejected { command, reason } => ForgeIdeError::SandboxViolation {
                path: command,
                attempted_path: None,
                root: None,
                reason,
            },
            RunnerError::Spawn(msg) => ForgeIdeError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
