// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Shared across concurrently running pipelines; warnings never fail a unit.

use parking_lot::Mutex;
use serde::Serialize;

use crate::types::UnitId;

/// Collects non-fatal warnings from every pipeline of a run.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        match &warning.unit {
            Some(unit) => tracing::warn!(unit = %unit, "{}", warning.message),
            None => tracing::warn!("{}", warning.message),
        }
        self.warnings.lock().push(warning);
    }

    /// Snapshot of all collected warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitId>,
    pub message: String,
}

impl Warning {
    /// A non-fatal hook (post-deploy, post-destroy) failed.
    pub fn hook_failed(unit: &UnitId, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HookFailed,
            unit: Some(unit.clone()),
            message: message.into(),
        }
    }

    /// The status probe could not refresh a unit.
    pub fn probe_failed(unit: &UnitId, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ProbeFailed,
            unit: Some(unit.clone()),
            message: message.into(),
        }
    }

    /// The post-destroy sweep of shared resources failed.
    pub fn finalization(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Finalization,
            unit: None,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    HookFailed,
    ProbeFailed,
    Finalization,
}
