// ABOUTME: Deploy and destroy command implementation.
// ABOUTME: Wires manifest commands into the scheduler and reports the run.

use convoy::collaborators::ProcessRunner;
use convoy::config::Manifest;
use convoy::error::Result;
use convoy::mode::Mode;
use convoy::options::OperationOptions;
use convoy::output::Output;
use convoy::reporter::ConsoleReporter;
use convoy::scheduler::{OperationRequest, Scheduler};
use convoy::shell::ShellCollaborators;
use std::path::Path;
use std::sync::Arc;

/// Run one deploy or destroy. Returns false if any unit failed or was cancelled.
pub async fn run_operation(
    manifest: &Manifest,
    root: &Path,
    mode: Mode,
    selected: &[String],
    options: OperationOptions,
    mut output: Output,
) -> Result<bool> {
    let units = manifest.into_units(root, selected)?;

    output.start_timer();
    output.progress(&format!(
        "Running {} for {} unit(s)",
        mode,
        units.iter().filter(|u| !u.skip).count()
    ));

    let collaborators =
        ShellCollaborators::new(manifest.commands.clone(), Arc::new(ProcessRunner))
            .into_collaborators();
    let reporter = Arc::new(ConsoleReporter::new(Output::new(output.mode())));
    let scheduler = Scheduler::new(collaborators, reporter);

    let summary = scheduler
        .run(OperationRequest {
            units,
            mode,
            options,
        })
        .await?;

    output.summary(&summary);
    for warning in &summary.warnings {
        output.warning(&warning.message);
    }

    if summary.is_success() {
        output.success(&format!("{mode} complete"));
        Ok(true)
    } else {
        output.error(&format!(
            "{mode} finished with {} failed and {} cancelled unit(s)",
            summary.failed(),
            summary.cancelled()
        ));
        Ok(false)
    }
}
