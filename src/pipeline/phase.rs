// ABOUTME: Pipeline phases and the errors that abort them.
// ABOUTME: Phase errors map onto the non-zero exit code a pipeline reports.

use std::fmt;

use crate::collaborators::CollaboratorError;
use crate::types::Digest;
use crate::unit::Module;

/// One step of a unit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Parameters,
    Image,
    Stack,
    /// Removal of generated local artifacts after a destroy.
    Cleanup,
}

impl Phase {
    /// Module a unit must enable for this phase to run.
    pub fn module(self) -> Option<Module> {
        match self {
            Phase::Parameters => Some(Module::Parameters),
            Phase::Image => Some(Module::Image),
            Phase::Stack => Some(Module::Stack),
            Phase::Cleanup => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Parameters => f.write_str("parameters"),
            Phase::Image => f.write_str("image"),
            Phase::Stack => f.write_str("stack"),
            Phase::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// Errors that abort the remaining phases of a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("{step} exited with code {code}")]
    NonZeroExit { step: &'static str, code: i32 },

    #[error("{hook} hook failed")]
    HookFailed {
        hook: &'static str,
        exit_code: Option<i32>,
    },

    #[error("push of {image} did not report a digest")]
    MissingDigest { image: String },

    #[error("digest {digest} not visible after {attempts} attempts")]
    DigestNotVisible { digest: Digest, attempts: u32 },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("failed to remove local artifacts: {0}")]
    Cleanup(#[from] std::io::Error),
}

impl PhaseError {
    /// Exit code reported for this failure; never zero.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            PhaseError::NonZeroExit { code, .. } => *code,
            PhaseError::HookFailed { exit_code, .. } => exit_code.unwrap_or(1),
            _ => 1,
        };
        if code == 0 { 1 } else { code }
    }
}
