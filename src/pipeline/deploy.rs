// ABOUTME: Deploy-mode phase implementations.
// ABOUTME: Parameters, image build/push with digest verification, and stack apply.

use super::context::PipelineContext;
use super::phase::{Phase, PhaseError};
use crate::collaborators::BuildRequest;
use crate::hooks::HookPoint;
use crate::types::{Digest, ImageRef};

/// Registry assumed for references without an explicit host.
const DEFAULT_REGISTRY: &str = "docker.io";

pub(super) async fn run_phase(ctx: &mut PipelineContext, phase: Phase) -> Result<(), PhaseError> {
    match phase {
        Phase::Parameters => parameters(ctx).await,
        Phase::Image => image(ctx).await,
        Phase::Stack => stack(ctx).await,
        Phase::Cleanup => Ok(()),
    }
}

async fn parameters(ctx: &mut PipelineContext) -> Result<(), PhaseError> {
    let config = ctx.run.collaborators.config.clone();
    let guards = ctx.run.guards.clone();

    {
        let _held = guards.config_init().await;
        config.init_config(&ctx.unit).await?;
        config.materialize_config(&ctx.unit).await?;
    }

    let deployed = {
        let _held = guards.config_read().await;
        config.read_deployed_config(&ctx.unit).await?
    };
    tracing::debug!(unit = %ctx.unit.id, "read {} deployed parameter(s)", deployed.len());
    ctx.deployed_config = deployed;
    Ok(())
}

async fn image(ctx: &mut PipelineContext) -> Result<(), PhaseError> {
    let Some(spec) = ctx.unit.image.clone() else {
        return Ok(());
    };
    let images = ctx.run.collaborators.images.clone();
    let target = spec.repository.with_tag(&ctx.unit.version);

    ctx.run_hook(HookPoint::PreBuild).await?;

    // The base sync pushes into the same registry, so the session must exist first.
    login(ctx, target.registry().unwrap_or(DEFAULT_REGISTRY)).await?;

    if let Some(base) = &spec.base {
        sync_base(ctx, base).await?;
    }

    if ctx.run.options.skip_build {
        ctx.info("build skipped, reusing local image");
    } else {
        ctx.info(&format!("building {target}"));
        let request = BuildRequest {
            image: target.clone(),
            base: spec.base.clone(),
            force: ctx.run.options.force,
        };
        let output = images.build_image(&ctx.unit, &request).await?;
        ctx.check("build", &output)?;
    }

    let pushed = images.push_image(&ctx.unit, &target).await?;
    ctx.check("push", &pushed.output)?;
    let digest = pushed.digest.ok_or_else(|| PhaseError::MissingDigest {
        image: target.to_string(),
    })?;

    verify_digest(ctx, &target, &digest).await?;

    ctx.info(&format!("pushed {target} ({digest})"));
    ctx.image = Some(target.pinned(&digest));
    ctx.digest = Some(digest);
    Ok(())
}

/// Mirror a shared base image, once per base image per run.
async fn sync_base(ctx: &PipelineContext, base: &ImageRef) -> Result<(), PhaseError> {
    let guards = ctx.run.guards.clone();
    let mut sessions = guards.registry_login().await;
    let key = base.to_string();
    if sessions.is_base_synced(&key) {
        return Ok(());
    }

    ctx.info(&format!("syncing base image {key}"));
    let output = ctx
        .run
        .collaborators
        .images
        .sync_base_image(&ctx.unit, base)
        .await?;
    ctx.check("base image sync", &output)?;
    sessions.mark_base_synced(&key);
    Ok(())
}

/// Log in to `registry`, once per registry per run.
async fn login(ctx: &PipelineContext, registry: &str) -> Result<(), PhaseError> {
    let guards = ctx.run.guards.clone();
    let mut sessions = guards.registry_login().await;
    if sessions.is_logged_in(registry) {
        return Ok(());
    }

    tracing::info!(unit = %ctx.unit.id, "logging in to {}", registry);
    ctx.run.collaborators.images.login(registry).await?;
    sessions.mark_logged_in(registry);
    Ok(())
}

/// Wait for a pushed digest to become visible, with bounded fixed-delay retries.
async fn verify_digest(
    ctx: &PipelineContext,
    image: &ImageRef,
    digest: &Digest,
) -> Result<(), PhaseError> {
    let policy = ctx.run.options.digest_retry;
    let attempts = policy.attempts.max(1);
    let images = &ctx.run.collaborators.images;

    for attempt in 1..=attempts {
        match images.verify_digest_visible(&ctx.unit, image, digest).await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                tracing::debug!(unit = %ctx.unit.id, attempt, "digest {} not visible yet", digest);
            }
            Err(e) => {
                tracing::warn!(unit = %ctx.unit.id, attempt, "digest check failed: {}", e);
            }
        }

        if attempt < attempts {
            ctx.info(&format!(
                "waiting for {digest} to become visible ({attempt}/{attempts})"
            ));
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(PhaseError::DigestNotVisible {
        digest: digest.clone(),
        attempts,
    })
}

async fn stack(ctx: &mut PipelineContext) -> Result<(), PhaseError> {
    ctx.run_hook(HookPoint::PreDeploy).await?;

    let inputs = ctx.stack_inputs();
    let output = ctx
        .run
        .collaborators
        .infra
        .apply(&ctx.unit, &inputs)
        .await?;
    ctx.check("apply", &output)?;

    ctx.run_hook(HookPoint::PostDeploy).await
}
