// ABOUTME: Status command implementation.
// ABOUTME: Probes every unit concurrently and prints its environment status.

use convoy::collaborators::{ProcessRunner, StatusProbe};
use convoy::config::Manifest;
use convoy::error::Result;
use convoy::output::Output;
use convoy::shell::ShellCollaborators;
use convoy::status::{EnvironmentStatus, ProcessStatus, StatusSnapshot};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;

pub async fn status(manifest: &Manifest, root: &Path, output: Output) -> Result<bool> {
    let units = manifest.into_units(root, &[])?;
    let shell = ShellCollaborators::new(manifest.commands.clone(), Arc::new(ProcessRunner));

    let results = join_all(units.iter().map(|unit| shell.check_status(unit))).await;

    let mut all_probed = true;
    for (unit, result) in units.iter().zip(results) {
        let environment = match result {
            Ok(status) => status,
            Err(e) => {
                output.warning(&format!("{}: {}", unit.id, e));
                all_probed = false;
                EnvironmentStatus::None
            }
        };
        output.status(&StatusSnapshot::now(
            unit.id.clone(),
            ProcessStatus::None,
            environment,
        ));
    }
    Ok(all_probed)
}
