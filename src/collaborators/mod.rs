// ABOUTME: Narrow async interfaces to the systems a pipeline drives.
// ABOUTME: Status probe, configuration store, image registry, infra tool, and command runner.

mod command;
mod config_store;
mod error;
mod image;
mod infra;
mod probe;

pub use command::{CommandOutput, CommandRunner, ProcessRunner};
pub use config_store::{ConfigScope, ConfigStore};
pub use error::CollaboratorError;
pub use image::{BuildRequest, ImageClient, PushOutput};
pub use infra::{InfraClient, StackInputs};
pub use probe::StatusProbe;

use std::sync::Arc;

/// Every external system one run talks to, shared by all pipelines.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn StatusProbe>,
    pub config: Arc<dyn ConfigStore>,
    pub images: Arc<dyn ImageClient>,
    pub infra: Arc<dyn InfraClient>,
    pub runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
