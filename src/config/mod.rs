// ABOUTME: Manifest types and parsing for convoy.yml.
// ABOUTME: Handles YAML parsing, validation, unit selection, and conversion into units.

mod commands;
mod deserialize;
mod env_value;
mod init;

pub use commands::CommandTemplates;
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;

use crate::error::{Error, Result};
use crate::graph;
use crate::mode::Mode;
use crate::options::RetryPolicy;
use crate::types::{ImageRef, UnitId};
use crate::unit::{ImageSpec, Module, ModuleSet, Unit, derive_destroy_dependencies};
use deserialize::{deserialize_image_ref_option, deserialize_units};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "convoy.yml";
pub const CONFIG_FILENAME_ALT: &str = "convoy.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".convoy/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub commands: CommandTemplates,

    #[serde(deserialize_with = "deserialize_units")]
    pub units: NonEmpty<UnitConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Serialize configuration init and read-back across units.
    #[serde(default = "default_true")]
    pub serialize_config: bool,

    #[serde(default)]
    pub digest_retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            serialize_config: true,
            digest_retry: RetryPolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitConfig {
    pub id: UnitId,

    /// Unit directory, relative to the manifest. Defaults to the id.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Enabled modules. Defaults to all of them.
    #[serde(default)]
    pub modules: Option<Vec<Module>>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default, deserialize_with = "deserialize_image_ref_option")]
    pub image: Option<ImageRef>,

    #[serde(default, deserialize_with = "deserialize_image_ref_option")]
    pub base_image: Option<ImageRef>,

    #[serde(default)]
    pub depends_on: Vec<UnitId>,

    /// Units destroyed before this one. Defaults to its dependents.
    #[serde(default)]
    pub destroy_depends_on: Option<Vec<UnitId>>,

    #[serde(default)]
    pub global: bool,

    #[serde(default)]
    pub vars: BTreeMap<String, EnvValue>,
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find and load the manifest in `dir`.
    ///
    /// Returns the manifest with the directory unit paths are relative to.
    pub fn discover(dir: &Path) -> Result<(Self, PathBuf)> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Ok((Self::load(path)?, dir.to_path_buf()));
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Reject duplicate ids, several global units, and broken dependency graphs.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for unit in self.units.iter() {
            if !seen.insert(&unit.id) {
                return Err(Error::DuplicateUnit(unit.id.clone()));
            }
        }

        let globals: Vec<&str> = self
            .units
            .iter()
            .filter(|u| u.global)
            .map(|u| u.id.as_str())
            .collect();
        if globals.len() > 1 {
            return Err(Error::InvalidConfig(format!(
                "only one global unit is allowed, found: {}",
                globals.join(", ")
            )));
        }

        for unit in self.units.iter() {
            if unit.modules.as_ref().is_some_and(|m| m.is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "unit '{}' enables no modules",
                    unit.id
                )));
            }
            if unit.base_image.is_some() && unit.image.is_none() {
                return Err(Error::InvalidConfig(format!(
                    "unit '{}' sets base_image without image",
                    unit.id
                )));
            }
        }

        let units = self.build_units(Path::new("."));
        graph::validate(&units, Mode::Deploy)?;
        graph::validate(&units, Mode::Destroy)?;
        Ok(())
    }

    fn build_units(&self, root: &Path) -> Vec<Unit> {
        let mut units: Vec<Unit> = self
            .units
            .iter()
            .map(|config| config.to_unit(root))
            .collect();

        derive_destroy_dependencies(&mut units);
        for (unit, config) in units.iter_mut().zip(self.units.iter()) {
            if let Some(explicit) = &config.destroy_depends_on {
                unit.destroy_dependencies = explicit.clone();
            }
        }
        units
    }

    /// Convert into units for one run, resolving variables.
    ///
    /// Units outside `selected` are marked skipped; an empty selection
    /// means every unit.
    pub fn into_units(&self, root: &Path, selected: &[String]) -> Result<NonEmpty<Unit>> {
        for name in selected {
            if !self.units.iter().any(|u| u.id.as_str() == name) {
                return Err(Error::UnknownUnit(name.clone()));
            }
        }

        let mut units = self.build_units(root);
        for (unit, config) in units.iter_mut().zip(self.units.iter()) {
            unit.vars = resolve_env_map(&config.vars)?;
            unit.skip = !selected.is_empty() && !selected.iter().any(|s| s == unit.id.as_str());
        }

        NonEmpty::from_vec(units).ok_or_else(|| Error::InvalidConfig("no units defined".to_string()))
    }
}

impl UnitConfig {
    fn to_unit(&self, root: &Path) -> Unit {
        let path = root.join(
            self.path
                .clone()
                .unwrap_or_else(|| PathBuf::from(self.id.as_str())),
        );
        let mut unit = Unit::new(self.id.clone(), path);

        if let Some(modules) = &self.modules {
            unit.modules = modules.iter().copied().collect::<ModuleSet>();
        }
        if let Some(version) = &self.version {
            unit.version = version.clone();
        }
        unit.image = self.image.clone().map(|repository| ImageSpec {
            repository,
            base: self.base_image.clone(),
        });
        unit.deploy_dependencies = self.depends_on.clone();
        unit.global = self.global;
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_path_defaults_to_id() {
        let manifest = Manifest::from_yaml("units:\n  - id: api\n").unwrap();
        let units = manifest.into_units(Path::new("/srv/app"), &[]).unwrap();
        assert_eq!(units.head.path, PathBuf::from("/srv/app/api"));
        assert_eq!(units.head.version, "latest");
        assert!(units.head.modules.contains(Module::Stack));
    }

    #[test]
    fn explicit_destroy_list_overrides_derived_one() {
        let yaml = r#"
units:
  - id: db
    destroy_depends_on: []
  - id: api
    depends_on: [db]
"#;
        let manifest = Manifest::from_yaml(yaml).unwrap();
        let units = manifest.into_units(Path::new("."), &[]).unwrap();
        assert!(units.head.destroy_dependencies.is_empty());
    }
}
