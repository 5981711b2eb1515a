// ABOUTME: Operation mode (deploy or destroy), chosen once per run.
// ABOUTME: Owns phase order, dependency direction, and per-phase gating.

use serde::Serialize;
use std::fmt;

use crate::options::OperationOptions;
use crate::pipeline::Phase;
use crate::status::EnvironmentStatus;
use crate::types::UnitId;
use crate::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Deploy,
    Destroy,
}

/// Outcome of gating a phase before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Run,
    Skip(&'static str),
}

const DEPLOY_PHASES: [Phase; 3] = [Phase::Parameters, Phase::Image, Phase::Stack];
const DESTROY_PHASES: [Phase; 4] = [Phase::Parameters, Phase::Image, Phase::Stack, Phase::Cleanup];

impl Mode {
    pub fn phase_order(self) -> &'static [Phase] {
        match self {
            Mode::Deploy => &DEPLOY_PHASES,
            Mode::Destroy => &DESTROY_PHASES,
        }
    }

    /// Units `unit` must wait on in this mode.
    ///
    /// Deploy lists point at producers, destroy lists at consumers, so
    /// producers deploy first and consumers are destroyed first.
    pub fn dependencies(self, unit: &Unit) -> &[UnitId] {
        match self {
            Mode::Deploy => &unit.deploy_dependencies,
            Mode::Destroy => &unit.destroy_dependencies,
        }
    }

    /// Static gate: module, phase selection, and mode-specific rules.
    pub fn gate(self, unit: &Unit, phase: Phase, options: &OperationOptions) -> Gate {
        if let Some(module) = phase.module() {
            if !unit.has_module(module) {
                return Gate::Skip("module disabled");
            }
            if !options.phases.includes(phase) {
                return Gate::Skip("phase not selected");
            }
        }

        match (self, phase) {
            (Mode::Deploy, Phase::Cleanup) => Gate::Skip("not part of deploy"),
            (Mode::Destroy, Phase::Parameters | Phase::Image)
                if !options.phases.explicitly_requested(phase) =>
            {
                Gate::Skip("teardown not requested")
            }
            (_, Phase::Image) if unit.image.is_none() => {
                Gate::Skip("no image repository configured")
            }
            _ => Gate::Run,
        }
    }

    /// Whether the status probe should be asked if `phase` is already current.
    pub fn checks_versions(self, options: &OperationOptions) -> bool {
        self == Mode::Deploy && options.strict_versions && !options.force
    }

    /// Optimistic environment status after a successful pipeline.
    pub fn settled_environment(self) -> EnvironmentStatus {
        match self {
            Mode::Deploy => EnvironmentStatus::UpToDate,
            Mode::Destroy => EnvironmentStatus::NotDeployed,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Deploy => f.write_str("deploy"),
            Mode::Destroy => f.write_str("destroy"),
        }
    }
}
