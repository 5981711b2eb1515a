// ABOUTME: Status probe interface deciding whether a unit is currently up to date.
// ABOUTME: Seeds environment status before a run and refreshes it after each pipeline.

use async_trait::async_trait;

use super::CollaboratorError;
use crate::pipeline::Phase;
use crate::status::EnvironmentStatus;
use crate::unit::Unit;

#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Current deployed state of `unit` relative to its desired state.
    async fn check_status(&self, unit: &Unit) -> Result<EnvironmentStatus, CollaboratorError>;

    /// Whether `phase` is already current for `unit`, for strict-version runs.
    async fn phase_up_to_date(&self, unit: &Unit, phase: Phase) -> Result<bool, CollaboratorError> {
        let _ = (unit, phase);
        Ok(false)
    }
}
