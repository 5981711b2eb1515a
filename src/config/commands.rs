// ABOUTME: Command templates backing the shell collaborators.
// ABOUTME: Each operation maps to an optional `sh -c` template with {placeholder} substitution.

use serde::Deserialize;

/// Command templates keyed by collaborator operation.
///
/// Placeholders: `{unit}`, `{path}`, `{version}`, `{image}`, `{digest}`,
/// `{registry}`, `{scope}`, `{phase}`, `{base}`. Missing templates are no-ops.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandTemplates {
    /// Prints an environment status name as its first word.
    pub status: Option<String>,
    /// Exits 0 if `{phase}` is already current.
    pub up_to_date: Option<String>,
    pub config_init: Option<String>,
    pub config_materialize: Option<String>,
    /// Prints `KEY=VALUE` lines.
    pub config_read: Option<String>,
    pub config_delete: Option<String>,
    pub build: Option<String>,
    /// Prints the pushed digest on a line containing `sha256:`.
    pub push: Option<String>,
    pub login: Option<String>,
    /// Exits 0 once `{digest}` is visible in the registry.
    pub verify_digest: Option<String>,
    pub sync_base: Option<String>,
    pub delete_repository: Option<String>,
    /// Receives stack inputs as environment variables.
    pub apply: Option<String>,
    pub destroy: Option<String>,
}
