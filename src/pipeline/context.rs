// ABOUTME: Per-unit pipeline context with an explicit working directory.
// ABOUTME: Bundles run-wide resources with state carried between phases.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::guards::Guards;
use super::phase::PhaseError;
use crate::collaborators::{Collaborators, CommandOutput, StackInputs};
use crate::diagnostics::{Diagnostics, Warning};
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::mode::Mode;
use crate::options::OperationOptions;
use crate::reporter::{OutputStream, Reporter};
use crate::types::{Digest, ImageRef};
use crate::unit::Unit;

/// Resources shared by every pipeline of one run.
#[derive(Clone)]
pub struct RunResources {
    pub mode: Mode,
    pub options: Arc<OperationOptions>,
    pub guards: Arc<Guards>,
    pub collaborators: Collaborators,
    pub reporter: Arc<dyn Reporter>,
    pub diagnostics: Arc<Diagnostics>,
}

impl RunResources {
    pub fn new(
        mode: Mode,
        options: OperationOptions,
        collaborators: Collaborators,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let guards = Arc::new(Guards::new(options.serialize_config));
        Self {
            mode,
            options: Arc::new(options),
            guards,
            collaborators,
            reporter,
            diagnostics: Arc::new(Diagnostics::default()),
        }
    }
}

/// Everything one unit's pipeline needs.
///
/// Pipelines never change the process working directory; external calls
/// run in `working_dir()` instead.
pub struct PipelineContext {
    pub unit: Unit,
    pub run: RunResources,
    hooks: HookRunner,
    pub(super) deployed_config: BTreeMap<String, String>,
    pub(super) image: Option<ImageRef>,
    pub(super) digest: Option<Digest>,
}

impl PipelineContext {
    pub fn new(unit: Unit, run: RunResources) -> Self {
        let hooks = HookRunner::new(&unit.path);
        Self {
            unit,
            run,
            hooks,
            deployed_config: BTreeMap::new(),
            image: None,
            digest: None,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.unit.path
    }

    /// Pinned image pushed by the image phase, if it ran.
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    /// Engine commentary on the unit's output stream.
    pub(crate) fn info(&self, text: &str) {
        tracing::debug!(unit = %self.unit.id, "{}", text);
        self.run
            .reporter
            .output(&self.unit.id, OutputStream::Info, text);
    }

    pub(crate) fn forward(&self, stdout: &str, stderr: &str) {
        let reporter = &self.run.reporter;
        if !stdout.is_empty() {
            reporter.output(&self.unit.id, OutputStream::Stdout, stdout);
        }
        if !stderr.is_empty() {
            reporter.output(&self.unit.id, OutputStream::Stderr, stderr);
        }
    }

    /// Forward a command's output and turn a non-zero exit into an error.
    pub(crate) fn check(&self, step: &'static str, output: &CommandOutput) -> Result<(), PhaseError> {
        self.forward(&output.stdout, &output.stderr);
        if output.is_success() {
            Ok(())
        } else {
            Err(PhaseError::NonZeroExit {
                step,
                code: output.exit_code,
            })
        }
    }

    fn hook_context(&self) -> HookContext {
        let image = match (&self.image, &self.unit.image) {
            (Some(pinned), _) => Some(pinned.to_string()),
            (None, Some(spec)) => Some(spec.repository.with_tag(&self.unit.version).to_string()),
            (None, None) => None,
        };
        HookContext {
            unit: self.unit.id.clone(),
            mode: self.run.mode,
            version: self.unit.version.clone(),
            image,
            digest: self.digest.as_ref().map(ToString::to_string),
        }
    }

    /// Run the hook at `point` if the unit has one.
    ///
    /// Fatal hooks abort the phase; the rest only leave a warning.
    pub(crate) async fn run_hook(&self, point: HookPoint) -> Result<(), PhaseError> {
        let context = self.hook_context();
        let runner = self.run.collaborators.runner.as_ref();
        let Some(result) = self.hooks.run(point, &context, runner).await else {
            return Ok(());
        };
        self.forward(&result.stdout, &result.stderr);

        if result.success {
            return Ok(());
        }
        if point.is_fatal() {
            return Err(PhaseError::HookFailed {
                hook: point.filename(),
                exit_code: result.exit_code,
            });
        }
        self.run.diagnostics.warn(Warning::hook_failed(
            &self.unit.id,
            format!(
                "{} hook failed with exit code {:?}",
                point.filename(),
                result.exit_code
            ),
        ));
        Ok(())
    }

    /// Inputs for the infrastructure apply command.
    ///
    /// Deployed configuration is overlaid by unit variables, and the
    /// resolved version and image always win.
    pub fn stack_inputs(&self) -> StackInputs {
        let mut inputs = StackInputs::default();
        for (key, value) in self.deployed_config.iter().chain(&self.unit.vars) {
            inputs.set(key, value.clone());
        }
        inputs.set("version", self.unit.version.clone());
        if let Some(image) = &self.image {
            inputs.set("image", image.to_string());
        }
        if let Some(digest) = &self.digest {
            inputs.set("image_digest", digest.to_string());
        }
        inputs
    }
}
