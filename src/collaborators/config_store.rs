// ABOUTME: Configuration store interface for unit parameter sets.
// ABOUTME: Init, materialize, read back deployed values, and delete by scope.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

use super::CollaboratorError;
use crate::unit::Unit;

/// Which configuration entries a delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Entries owned by one unit.
    Unit,
    /// Entries shared by the whole application, swept after a full destroy.
    Shared,
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Unit => f.write_str("unit"),
            ConfigScope::Shared => f.write_str("shared"),
        }
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn init_config(&self, unit: &Unit) -> Result<(), CollaboratorError>;

    /// Write the unit's resolved parameters to the store.
    async fn materialize_config(&self, unit: &Unit) -> Result<(), CollaboratorError>;

    /// Values as deployed, fed to the stack phase as inputs.
    async fn read_deployed_config(
        &self,
        unit: &Unit,
    ) -> Result<BTreeMap<String, String>, CollaboratorError>;

    async fn delete_config(&self, unit: &Unit, scope: ConfigScope)
    -> Result<(), CollaboratorError>;
}
