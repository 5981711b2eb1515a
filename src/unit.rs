// ABOUTME: Deployable unit definition and its per-run status fields.
// ABOUTME: Units carry enabled modules, image settings, and declared dependencies per mode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::status::{EnvironmentStatus, ProcessStatus};
use crate::types::{ImageRef, UnitId};

/// A unit capability that maps onto one pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Parameters,
    Image,
    Stack,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::Parameters => "parameters",
            Module::Image => "image",
            Module::Stack => "stack",
        };
        f.write_str(name)
    }
}

/// Set of enabled modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleSet {
    parameters: bool,
    image: bool,
    stack: bool,
}

impl ModuleSet {
    pub fn all() -> Self {
        Self {
            parameters: true,
            image: true,
            stack: true,
        }
    }

    pub fn with(mut self, module: Module) -> Self {
        match module {
            Module::Parameters => self.parameters = true,
            Module::Image => self.image = true,
            Module::Stack => self.stack = true,
        }
        self
    }

    pub fn contains(&self, module: Module) -> bool {
        match module {
            Module::Parameters => self.parameters,
            Module::Image => self.image,
            Module::Stack => self.stack,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.parameters || self.image || self.stack)
    }
}

impl FromIterator<Module> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = Module>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ModuleSet::default(), |set, module| set.with(module))
    }
}

/// Image settings for units with the image module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    /// Repository the unit image is pushed to, tagged with the unit version.
    pub repository: ImageRef,
    /// Shared base image mirrored into the registry before the build.
    pub base: Option<ImageRef>,
}

/// Whether a unit's declared dependencies are tracked for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyTracking {
    #[default]
    Tracked,
    /// Dependency awareness is off: declared dependencies are ignored.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    /// Directory the unit's external commands run in.
    pub path: PathBuf,
    pub modules: ModuleSet,
    pub version: String,
    pub image: Option<ImageSpec>,
    /// Units this unit waits on when deploying.
    pub deploy_dependencies: Vec<UnitId>,
    /// Units this unit waits on when destroying.
    pub destroy_dependencies: Vec<UnitId>,
    /// Synthetic aggregate unit, resolved after everything else.
    pub global: bool,
    /// Loaded but outside the scope of this run.
    pub skip: bool,
    /// Extra inputs passed to the infrastructure apply command.
    pub vars: BTreeMap<String, String>,
    pub(crate) process_status: ProcessStatus,
    pub(crate) environment_status: EnvironmentStatus,
    pub(crate) dependency_tracking: DependencyTracking,
}

impl Unit {
    pub fn new(id: UnitId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
            modules: ModuleSet::all(),
            version: "latest".to_string(),
            image: None,
            deploy_dependencies: Vec::new(),
            destroy_dependencies: Vec::new(),
            global: false,
            skip: false,
            vars: BTreeMap::new(),
            process_status: ProcessStatus::None,
            environment_status: EnvironmentStatus::None,
            dependency_tracking: DependencyTracking::Tracked,
        }
    }

    pub fn process_status(&self) -> ProcessStatus {
        self.process_status
    }

    pub fn environment_status(&self) -> EnvironmentStatus {
        self.environment_status
    }

    pub fn dependency_tracking(&self) -> DependencyTracking {
        self.dependency_tracking
    }

    pub fn has_module(&self, module: Module) -> bool {
        self.modules.contains(module)
    }
}

/// Fill every unit's destroy list with the units that depend on it when deploying.
///
/// Consumers are torn down before the producers they depend on.
pub fn derive_destroy_dependencies(units: &mut [Unit]) {
    let dependents: Vec<Vec<UnitId>> = units
        .iter()
        .map(|producer| {
            units
                .iter()
                .filter(|consumer| consumer.deploy_dependencies.contains(&producer.id))
                .map(|consumer| consumer.id.clone())
                .collect()
        })
        .collect();

    for (unit, dependents) in units.iter_mut().zip(dependents) {
        unit.destroy_dependencies = dependents;
    }
}
