// ABOUTME: Error type shared by all collaborator interfaces.
// ABOUTME: Distinguishes spawn failures, rejected calls, and unparseable output.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("failed to run `{command}` in {}: {source}", .dir.display())]
    Spawn {
        command: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed: {message}")]
    Rejected { operation: &'static str, message: String },

    #[error("unexpected output from {operation}: {output}")]
    InvalidOutput {
        operation: &'static str,
        output: String,
    },
}

impl CollaboratorError {
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        CollaboratorError::Rejected {
            operation,
            message: message.into(),
        }
    }
}
