// ABOUTME: Destroy-mode phase implementations.
// ABOUTME: Optional config and repository teardown, stack destroy, then local cleanup.

use std::io;
use std::path::Path;

use super::context::PipelineContext;
use super::phase::{Phase, PhaseError};
use crate::collaborators::ConfigScope;
use crate::hooks::HookPoint;

/// Generated local artifacts, relative to the unit directory.
pub const OUTPUT_DIR: &str = ".convoy/out";

pub(super) async fn run_phase(ctx: &mut PipelineContext, phase: Phase) -> Result<(), PhaseError> {
    match phase {
        Phase::Parameters => parameters(ctx).await,
        Phase::Image => image(ctx).await,
        Phase::Stack => stack(ctx).await,
        Phase::Cleanup => cleanup(ctx.working_dir()).await,
    }
}

async fn parameters(ctx: &mut PipelineContext) -> Result<(), PhaseError> {
    let guards = ctx.run.guards.clone();
    let _held = guards.config_init().await;
    ctx.run
        .collaborators
        .config
        .delete_config(&ctx.unit, ConfigScope::Unit)
        .await?;
    Ok(())
}

async fn image(ctx: &mut PipelineContext) -> Result<(), PhaseError> {
    let Some(spec) = &ctx.unit.image else {
        return Ok(());
    };
    ctx.info(&format!("deleting repository {}", spec.repository));
    let output = ctx
        .run
        .collaborators
        .images
        .delete_repository(&ctx.unit, &spec.repository)
        .await?;
    ctx.check("delete repository", &output)
}

async fn stack(ctx: &mut PipelineContext) -> Result<(), PhaseError> {
    ctx.run_hook(HookPoint::PreDestroy).await?;

    let output = ctx.run.collaborators.infra.destroy(&ctx.unit).await?;
    ctx.check("destroy", &output)?;

    ctx.run_hook(HookPoint::PostDestroy).await
}

async fn cleanup(unit_dir: &Path) -> Result<(), PhaseError> {
    match tokio::fs::remove_dir_all(unit_dir.join(OUTPUT_DIR)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PhaseError::Cleanup(e)),
    }
}
