// ABOUTME: Image build and registry interface.
// ABOUTME: Build, push, login, digest visibility, base image sync, and repository removal.

use async_trait::async_trait;

use super::{CollaboratorError, CommandOutput};
use crate::types::{Digest, ImageRef};
use crate::unit::Unit;

/// What to build for a unit.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Tagged target reference.
    pub image: ImageRef,
    pub base: Option<ImageRef>,
    /// Ignore build caches.
    pub force: bool,
}

/// Result of pushing an image.
#[derive(Debug, Clone)]
pub struct PushOutput {
    pub output: CommandOutput,
    /// Digest the registry assigned, if the push reported one.
    pub digest: Option<Digest>,
}

#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn build_image(
        &self,
        unit: &Unit,
        request: &BuildRequest,
    ) -> Result<CommandOutput, CollaboratorError>;

    async fn push_image(&self, unit: &Unit, image: &ImageRef)
    -> Result<PushOutput, CollaboratorError>;

    /// Exchange credentials with `registry`.
    async fn login(&self, registry: &str) -> Result<(), CollaboratorError>;

    async fn verify_digest_visible(
        &self,
        unit: &Unit,
        image: &ImageRef,
        digest: &Digest,
    ) -> Result<bool, CollaboratorError>;

    /// Pull a shared base image and push it to the unit's registry.
    async fn sync_base_image(
        &self,
        unit: &Unit,
        base: &ImageRef,
    ) -> Result<CommandOutput, CollaboratorError>;

    async fn delete_repository(
        &self,
        unit: &Unit,
        repository: &ImageRef,
    ) -> Result<CommandOutput, CollaboratorError>;
}
