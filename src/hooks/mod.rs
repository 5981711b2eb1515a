// ABOUTME: Per-unit hook scripts run around pipeline phases.
// ABOUTME: Discovers scripts under <unit>/.convoy/hooks and runs them through a CommandRunner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::collaborators::{CommandOutput, CommandRunner};
use crate::mode::Mode;
use crate::types::UnitId;

/// Hook execution points in a unit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the image is built. Failure aborts the pipeline.
    PreBuild,
    /// Before the stack is applied. Failure aborts the pipeline.
    PreDeploy,
    /// After the stack is applied. Failure logs a warning.
    PostDeploy,
    /// Before the stack is destroyed. Failure aborts the pipeline.
    PreDestroy,
    /// After the stack is destroyed. Failure logs a warning.
    PostDestroy,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreBuild => "pre-build",
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::PreDestroy => "pre-destroy",
            HookPoint::PostDestroy => "post-destroy",
        }
    }

    /// Whether failure at this hook point should abort the pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HookPoint::PreBuild | HookPoint::PreDeploy | HookPoint::PreDestroy
        )
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub unit: UnitId,
    pub mode: Mode,
    pub version: String,
    pub image: Option<String>,
    pub digest: Option<String>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("CONVOY_UNIT".to_string(), self.unit.to_string());
        env.insert("CONVOY_MODE".to_string(), self.mode.to_string());
        env.insert("CONVOY_VERSION".to_string(), self.version.clone());
        if let Some(ref image) = self.image {
            env.insert("CONVOY_IMAGE".to_string(), image.clone());
        }
        if let Some(ref digest) = self.digest {
            env.insert("CONVOY_DIGEST".to_string(), digest.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<CommandOutput> for HookResult {
    fn from(output: CommandOutput) -> Self {
        Self {
            success: output.is_success(),
            exit_code: Some(output.exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Discovers and runs hooks from a unit directory.
#[derive(Debug, Clone)]
pub struct HookRunner {
    unit_dir: PathBuf,
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a hook runner looking for hooks in the given unit directory.
    pub fn new(unit_dir: &Path) -> Self {
        Self {
            unit_dir: unit_dir.to_path_buf(),
            hooks_dir: unit_dir.join(".convoy").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    /// Get the path to a hook script.
    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(
        &self,
        point: HookPoint,
        context: &HookContext,
        runner: &dyn CommandRunner,
    ) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!(unit = %context.unit, "Running {} hook: {}", point.filename(), hook_path.display());

        let command = shell_quote(&hook_path.to_string_lossy());
        let result = match runner.run(&self.unit_dir, &command, &context.to_env()).await {
            Ok(output) => HookResult::from(output),
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        };

        if result.success {
            tracing::info!("{} hook completed successfully", point.filename());
        } else {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                point.filename(),
                result.exit_code
            );
        }

        Some(result)
    }
}

/// Single-quote `value` for `sh -c`.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
