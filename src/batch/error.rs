use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a batch before any file is processed.
///
/// Failures of individual files never surface here; they are recorded in
/// the file's [`JobResult`](super::JobResult).
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Output directory {path:?} unusable: {reason}")]
    OutputDir { path: PathBuf, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BatchError {
    pub fn output_dir(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OutputDir {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
