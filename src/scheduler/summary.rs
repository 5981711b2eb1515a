// ABOUTME: Final per-unit results of a run.
// ABOUTME: Serializable for JSON output; decides the process exit status.

use serde::Serialize;

use crate::diagnostics::Warning;
use crate::mode::Mode;
use crate::pipeline::Phase;
use crate::status::{EnvironmentStatus, ProcessStatus};
use crate::types::UnitId;
use crate::unit::DependencyTracking;

/// Where one unit ended up.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: UnitId,
    pub process: ProcessStatus,
    pub environment: EnvironmentStatus,
    pub dependency_tracking: DependencyTracking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "phase_name")]
    pub failed_phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn phase_name<S: serde::Serializer>(phase: &Option<Phase>, serializer: S) -> Result<S::Ok, S::Error> {
    match phase {
        Some(phase) => serializer.collect_str(phase),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub units: Vec<UnitReport>,
    pub warnings: Vec<Warning>,
}

impl RunSummary {
    fn count(&self, status: ProcessStatus) -> usize {
        self.units.iter().filter(|u| u.process == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(ProcessStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(ProcessStatus::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(ProcessStatus::Cancelled)
    }

    pub fn skipped(&self) -> usize {
        self.count(ProcessStatus::Skipped)
    }

    pub fn unit(&self, id: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.unit.as_str() == id)
    }

    /// No unit failed or was cancelled.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.cancelled() == 0
    }
}
