// ABOUTME: Per-unit pipeline runner.
// ABOUTME: Gates each phase for the run mode and stops at the first failing phase.

mod context;
mod deploy;
mod destroy;
mod guards;
mod phase;

pub use context::{PipelineContext, RunResources};
pub use destroy::OUTPUT_DIR;
pub use guards::{Guards, RegistrySessions};
pub use phase::{Phase, PhaseError};

use crate::diagnostics::Warning;
use crate::mode::{Gate, Mode};
use crate::reporter::OutputStream;

/// Final result of one unit pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub exit_code: i32,
    /// Phase that failed, if any.
    pub failed_phase: Option<Phase>,
    /// Message captured from the failing phase.
    pub message: Option<String>,
}

impl PipelineOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            failed_phase: None,
            message: None,
        }
    }

    pub fn failed(phase: Phase, error: &PhaseError) -> Self {
        Self {
            exit_code: error.exit_code(),
            failed_phase: Some(phase),
            message: Some(error.to_string()),
        }
    }

    /// The pipeline stopped outside any phase.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            failed_phase: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run every phase of the unit's pipeline in mode order.
///
/// Phase errors never escape: the first one becomes the outcome and the
/// remaining phases are not run.
pub async fn run_pipeline(mut ctx: PipelineContext) -> PipelineOutcome {
    let mode = ctx.run.mode;
    tracing::info!(unit = %ctx.unit.id, "starting {} pipeline", mode);

    for &phase in mode.phase_order() {
        if let Gate::Skip(reason) = mode.gate(&ctx.unit, phase, &ctx.run.options) {
            ctx.info(&format!("{phase} skipped: {reason}"));
            continue;
        }
        if mode.checks_versions(&ctx.run.options) && already_up_to_date(&ctx, phase).await {
            ctx.info(&format!("{phase} skipped: already up to date"));
            continue;
        }

        let result = match mode {
            Mode::Deploy => deploy::run_phase(&mut ctx, phase).await,
            Mode::Destroy => destroy::run_phase(&mut ctx, phase).await,
        };

        if let Err(error) = result {
            tracing::error!(unit = %ctx.unit.id, %phase, "{}", error);
            ctx.run.reporter.output(
                &ctx.unit.id,
                OutputStream::Stderr,
                &format!("{phase} failed: {error}"),
            );
            return PipelineOutcome::failed(phase, &error);
        }
    }

    tracing::info!(unit = %ctx.unit.id, "{} pipeline finished", mode);
    PipelineOutcome::success()
}

async fn already_up_to_date(ctx: &PipelineContext, phase: Phase) -> bool {
    if phase.module().is_none() {
        return false;
    }
    match ctx
        .run
        .collaborators
        .probe
        .phase_up_to_date(&ctx.unit, phase)
        .await
    {
        Ok(current) => current,
        Err(e) => {
            ctx.run.diagnostics.warn(Warning::probe_failed(
                &ctx.unit.id,
                format!("could not check {phase}: {e}"),
            ));
            false
        }
    }
}
