//! Network backend errors

use thiserror::Error;

/// Errors that can occur while reading or changing host network state
#[derive(Debug, Error)]
pub enum BackendError {
    /// A host command exited unsuccessfully
    #[error("Command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    /// A host command could not be started
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Command output did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON output from `ip`/`bridge` could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Some items of a batch failed; the others were applied
    #[error("{}", .0.join("; "))]
    Batch(Vec<String>),
}

impl BackendError {
    /// Wraps per-item failures of a batch, `Ok` when there were none
    pub fn from_batch(errors: Vec<String>) -> Result<(), BackendError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BackendError::Batch(errors))
        }
    }
}
