// ABOUTME: Scheduler error types with SNAFU pattern.
// ABOUTME: Raised before admission begins; a started run never fails as a whole.

use snafu::Snafu;

use crate::graph::GraphError;
use crate::mode::Mode;
use crate::types::UnitId;

/// Errors that stop an operation before any unit is scheduled.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OperationError {
    #[snafu(display("invalid dependency graph: {source}"))]
    Graph { source: GraphError },

    #[snafu(display("no units selected to {mode}"))]
    NothingSelected { mode: Mode },

    #[snafu(display("only one global unit is allowed, found: {}", render(units)))]
    MultipleGlobal { units: Vec<UnitId> },
}

fn render(units: &[UnitId]) -> String {
    units
        .iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationErrorKind {
    /// A dependency names a unit that was not loaded.
    UnknownDependency,
    /// A unit lists itself as a dependency.
    SelfDependency,
    /// Dependencies form a cycle in the run's mode.
    Cycle,
    /// Every unit is out of scope.
    NothingSelected,
    /// More than one unit is marked global.
    MultipleGlobal,
}

impl OperationError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> OperationErrorKind {
        match self {
            OperationError::Graph { source } => match source {
                GraphError::UnknownDependency { .. } => OperationErrorKind::UnknownDependency,
                GraphError::SelfDependency(_) => OperationErrorKind::SelfDependency,
                GraphError::Cycle { .. } => OperationErrorKind::Cycle,
            },
            OperationError::NothingSelected { .. } => OperationErrorKind::NothingSelected,
            OperationError::MultipleGlobal { .. } => OperationErrorKind::MultipleGlobal,
        }
    }
}

impl From<GraphError> for OperationError {
    fn from(source: GraphError) -> Self {
        OperationError::Graph { source }
    }
}
