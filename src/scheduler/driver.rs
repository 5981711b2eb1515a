// ABOUTME: Async driver loop launching unit pipelines as tokio tasks.
// ABOUTME: Seeds environment status, admits, awaits completions, and finalizes destroy runs.

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use nonempty::NonEmpty;
use snafu::ensure;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::error::{MultipleGlobalSnafu, NothingSelectedSnafu, OperationError};
use super::state::SchedulerState;
use super::summary::{RunSummary, UnitReport};
use crate::collaborators::{Collaborators, ConfigScope};
use crate::diagnostics::Warning;
use crate::graph;
use crate::mode::Mode;
use crate::options::OperationOptions;
use crate::pipeline::{PipelineContext, PipelineOutcome, RunResources, run_pipeline};
use crate::reporter::Reporter;
use crate::status::{EnvironmentStatus, ProcessStatus};
use crate::types::UnitId;
use crate::unit::Unit;

/// One deploy or destroy invocation.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub units: NonEmpty<Unit>,
    pub mode: Mode,
    pub options: OperationOptions,
}

/// Result delivered by a finished pipeline task.
struct Completion {
    unit: UnitId,
    outcome: PipelineOutcome,
    environment: Option<EnvironmentStatus>,
}

/// Runs operations against a fixed set of collaborators.
///
/// Holds no per-run state: every call to `run` builds its own queues and
/// blocking map.
pub struct Scheduler {
    collaborators: Collaborators,
    reporter: Arc<dyn Reporter>,
}

impl Scheduler {
    pub fn new(collaborators: Collaborators, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            collaborators,
            reporter,
        }
    }

    /// Drive every selected unit to a terminal status.
    ///
    /// Fails only on invalid input; unit failures are reported in the summary.
    pub async fn run(&self, request: OperationRequest) -> Result<RunSummary, OperationError> {
        let OperationRequest {
            units,
            mode,
            options,
        } = request;
        let units: Vec<Unit> = units.into_iter().collect();

        graph::validate(&units, mode)?;
        let globals: Vec<UnitId> = units
            .iter()
            .filter(|u| u.global)
            .map(|u| u.id.clone())
            .collect();
        ensure!(globals.len() <= 1, MultipleGlobalSnafu { units: globals });
        ensure!(units.iter().any(|u| !u.skip), NothingSelectedSnafu { mode });

        let dependencies = options.dependencies;
        let run = RunResources::new(
            mode,
            options,
            self.collaborators.clone(),
            self.reporter.clone(),
        );
        let mut state = SchedulerState::new(units, mode, dependencies, self.reporter.clone());

        tracing::info!(
            "{} run: {} unit(s), dependencies {}",
            mode,
            state.units().len(),
            if dependencies { "tracked" } else { "ignored" }
        );

        seed_environment(&mut state, &run).await;
        state.initialize();

        let mut outcomes: HashMap<UnitId, PipelineOutcome> = HashMap::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            let admission = state.admit();
            for unit in admission.launched {
                tracing::debug!(unit = %unit.id, "launching pipeline");
                in_flight.push(spawn_pipeline(unit, run.clone()));
            }
            if admission.finished {
                break;
            }

            match in_flight.next().await {
                Some(done) => {
                    if state.on_complete(&done.unit, done.outcome.exit_code, done.environment) {
                        outcomes.insert(done.unit, done.outcome);
                    }
                }
                None => {
                    if state.cancel_stranded().is_empty() {
                        break;
                    }
                }
            }
        }

        if mode == Mode::Destroy {
            finalize_destroy(&state, &run).await;
        }

        Ok(summarize(state, outcomes, &run))
    }
}

/// Probe every in-scope unit concurrently while it is INITIALIZING.
async fn seed_environment(state: &mut SchedulerState, run: &RunResources) {
    let scoped: Vec<Unit> = state.units().iter().filter(|u| !u.skip).cloned().collect();
    for unit in &scoped {
        state.set_status(&unit.id, ProcessStatus::Initializing);
    }

    let probe = &run.collaborators.probe;
    let results = join_all(scoped.iter().map(|unit| probe.check_status(unit))).await;

    for (unit, result) in scoped.iter().zip(results) {
        match result {
            Ok(status) => state.set_environment(&unit.id, status),
            Err(e) => run
                .diagnostics
                .warn(Warning::probe_failed(&unit.id, e.to_string())),
        }
    }
}

/// Launch a unit's pipeline on the runtime and re-probe it when done.
///
/// A panicking pipeline is reported as a failed one.
fn spawn_pipeline(unit: Unit, run: RunResources) -> impl Future<Output = Completion> {
    let id = unit.id.clone();
    let handle = tokio::spawn(async move {
        let probe = run.collaborators.probe.clone();
        let diagnostics = run.diagnostics.clone();
        let settled = run.mode.settled_environment();

        let outcome = run_pipeline(PipelineContext::new(unit.clone(), run)).await;

        let environment = match probe.check_status(&unit).await {
            Ok(status) => Some(status),
            Err(e) => {
                diagnostics.warn(Warning::probe_failed(&unit.id, e.to_string()));
                outcome.is_success().then_some(settled)
            }
        };
        Completion {
            unit: unit.id,
            outcome,
            environment,
        }
    });

    async move {
        match handle.await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!(unit = %id, "pipeline task failed: {}", e);
                Completion {
                    unit: id,
                    outcome: PipelineOutcome::aborted(e.to_string()),
                    environment: None,
                }
            }
        }
    }
}

/// Sweep shared configuration once a destroy run removed every unit.
async fn finalize_destroy(state: &SchedulerState, run: &RunResources) {
    let units = state.units();
    if units.iter().any(|u| u.process_status().poisons_dependents()) {
        tracing::info!("skipping shared cleanup: destroy did not complete");
        return;
    }

    for unit in units
        .iter()
        .filter(|u| u.global && u.process_status() == ProcessStatus::Completed)
    {
        tracing::info!(unit = %unit.id, "removing shared configuration");
        if let Err(e) = run
            .collaborators
            .config
            .delete_config(unit, ConfigScope::Shared)
            .await
        {
            run.diagnostics.warn(Warning::finalization(format!(
                "failed to remove shared configuration: {e}"
            )));
        }
    }
}

fn summarize(
    state: SchedulerState,
    mut outcomes: HashMap<UnitId, PipelineOutcome>,
    run: &RunResources,
) -> RunSummary {
    let mode = state.mode();
    let units = state
        .into_units()
        .into_iter()
        .map(|unit| {
            let outcome = outcomes.remove(&unit.id);
            UnitReport {
                process: unit.process_status(),
                environment: unit.environment_status(),
                dependency_tracking: unit.dependency_tracking(),
                exit_code: outcome.as_ref().map(|o| o.exit_code),
                failed_phase: outcome.as_ref().and_then(|o| o.failed_phase),
                message: outcome.and_then(|o| o.message),
                unit: unit.id,
            }
        })
        .collect();

    RunSummary {
        mode,
        units,
        warnings: run.diagnostics.warnings(),
    }
}
