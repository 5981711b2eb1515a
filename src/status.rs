// ABOUTME: Process and environment status model for deployable units.
// ABOUTME: Encodes the legal process lifecycle and the snapshot emitted on every change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnitId;

/// Operational lifecycle of a unit within one run.
///
/// ```text
/// NONE -> INITIALIZING -> READY -> (HAS_PREREQS <-> READY) -> PROCESSING
///      -> COMPLETED | FAILED | CANCELLED | SKIPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    None,
    Initializing,
    Ready,
    HasPrereqs,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl ProcessStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessStatus::Completed
                | ProcessStatus::Failed
                | ProcessStatus::Cancelled
                | ProcessStatus::Skipped
        )
    }

    /// Terminal states after which dependents may proceed.
    pub fn releases_dependents(self) -> bool {
        matches!(self, ProcessStatus::Completed | ProcessStatus::Skipped)
    }

    /// Terminal states that poison dependents.
    pub fn poisons_dependents(self) -> bool {
        matches!(self, ProcessStatus::Failed | ProcessStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: ProcessStatus) -> bool {
        use ProcessStatus::*;

        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (None, Initializing | Ready | Skipped | Cancelled) => true,
            (Initializing, Ready | Skipped | Cancelled) => true,
            (Ready, HasPrereqs | Processing | Skipped | Cancelled) => true,
            (HasPrereqs, Ready | Cancelled) => true,
            (Processing, Completed | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::None => "NONE",
            ProcessStatus::Initializing => "INITIALIZING",
            ProcessStatus::Ready => "READY",
            ProcessStatus::HasPrereqs => "HAS_PREREQS",
            ProcessStatus::Processing => "PROCESSING",
            ProcessStatus::Completed => "COMPLETED",
            ProcessStatus::Failed => "FAILED",
            ProcessStatus::Cancelled => "CANCELLED",
            ProcessStatus::Skipped => "SKIPPED",
        };
        f.pad(name)
    }
}

/// Last known deployed state of a unit relative to its desired state.
///
/// Owned by the status probe; the scheduler only applies optimistic resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentStatus {
    UpToDate,
    NotDeployed,
    NeedsUpdate,
    NeedsFix,
    Incomplete,
    Initializing,
    Cancelled,
    #[default]
    None,
}

impl EnvironmentStatus {
    fn name(self) -> &'static str {
        match self {
            EnvironmentStatus::UpToDate => "UP_TO_DATE",
            EnvironmentStatus::NotDeployed => "NOT_DEPLOYED",
            EnvironmentStatus::NeedsUpdate => "NEEDS_UPDATE",
            EnvironmentStatus::NeedsFix => "NEEDS_FIX",
            EnvironmentStatus::Incomplete => "INCOMPLETE",
            EnvironmentStatus::Initializing => "INITIALIZING",
            EnvironmentStatus::Cancelled => "CANCELLED",
            EnvironmentStatus::None => "NONE",
        }
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment status: {0}")]
pub struct UnknownEnvironmentStatus(pub String);

impl FromStr for EnvironmentStatus {
    type Err = UnknownEnvironmentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        [
            EnvironmentStatus::UpToDate,
            EnvironmentStatus::NotDeployed,
            EnvironmentStatus::NeedsUpdate,
            EnvironmentStatus::NeedsFix,
            EnvironmentStatus::Incomplete,
            EnvironmentStatus::Initializing,
            EnvironmentStatus::Cancelled,
            EnvironmentStatus::None,
        ]
        .into_iter()
        .find(|status| status.name() == normalized)
        .ok_or_else(|| UnknownEnvironmentStatus(s.to_string()))
    }
}

/// Point-in-time view of one unit, streamed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub unit: UnitId,
    pub process: ProcessStatus,
    pub environment: EnvironmentStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn now(unit: UnitId, process: ProcessStatus, environment: EnvironmentStatus) -> Self {
        Self {
            unit,
            process,
            environment,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_move() {
        for terminal in [
            ProcessStatus::Completed,
            ProcessStatus::Failed,
            ProcessStatus::Cancelled,
            ProcessStatus::Skipped,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(ProcessStatus::Ready));
            assert!(!terminal.can_transition_to(ProcessStatus::Cancelled));
        }
    }

    #[test]
    fn prereqs_toggle_with_ready() {
        assert!(ProcessStatus::Ready.can_transition_to(ProcessStatus::HasPrereqs));
        assert!(ProcessStatus::HasPrereqs.can_transition_to(ProcessStatus::Ready));
        assert!(!ProcessStatus::HasPrereqs.can_transition_to(ProcessStatus::Processing));
    }

    #[test]
    fn processing_only_ends_in_a_result() {
        assert!(ProcessStatus::Processing.can_transition_to(ProcessStatus::Completed));
        assert!(ProcessStatus::Processing.can_transition_to(ProcessStatus::Failed));
        assert!(!ProcessStatus::Processing.can_transition_to(ProcessStatus::Cancelled));
    }

    #[test]
    fn environment_status_parses_probe_output() {
        assert_eq!(
            "up_to_date".parse::<EnvironmentStatus>(),
            Ok(EnvironmentStatus::UpToDate)
        );
        assert_eq!(
            "NEEDS-UPDATE".parse::<EnvironmentStatus>(),
            Ok(EnvironmentStatus::NeedsUpdate)
        );
        assert!("deployed".parse::<EnvironmentStatus>().is_err());
    }

    #[test]
    fn snapshot_serializes_screaming_case() {
        let snapshot = StatusSnapshot::now(
            UnitId::new("api").unwrap(),
            ProcessStatus::HasPrereqs,
            EnvironmentStatus::NotDeployed,
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["process"], "HAS_PREREQS");
        assert_eq!(json["environment"], "NOT_DEPLOYED");
        assert_eq!(json["unit"], "api");
    }
}
