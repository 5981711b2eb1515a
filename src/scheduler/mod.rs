// ABOUTME: Dependency-aware scheduler for unit pipelines.
// ABOUTME: A synchronous state machine owned by an async driver loop.

mod driver;
mod error;
mod state;
mod summary;

pub use driver::{OperationRequest, Scheduler};
pub use error::{OperationError, OperationErrorKind};
pub use state::{Admission, SchedulerState};
pub use summary::{RunSummary, UnitReport};
