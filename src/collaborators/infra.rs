// ABOUTME: Infrastructure apply/destroy interface for unit stacks.
// ABOUTME: Stack inputs carry the resolved digest, version, and deployed parameters.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{CollaboratorError, CommandOutput};
use crate::unit::Unit;

/// Variables handed to the infrastructure apply command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackInputs {
    pub vars: BTreeMap<String, String>,
}

impl StackInputs {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait InfraClient: Send + Sync {
    async fn apply(&self, unit: &Unit, inputs: &StackInputs)
    -> Result<CommandOutput, CollaboratorError>;

    async fn destroy(&self, unit: &Unit) -> Result<CommandOutput, CollaboratorError>;
}
