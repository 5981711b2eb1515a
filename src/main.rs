// ABOUTME: Entry point for the convoy CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use convoy::config::{self, Manifest};
use convoy::error::Result;
use convoy::mode::Mode;
use convoy::options::{OperationOptions, PhaseSelection};
use convoy::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    match run(cli.command, Output::new(mode)).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn run(command: Commands, output: Output) -> Result<bool> {
    let cwd = env::current_dir()?;
    match command {
        Commands::Init { force } => {
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(true)
        }
        Commands::Deploy(args) => operation(&cwd, Mode::Deploy, args, output).await,
        Commands::Destroy(args) => operation(&cwd, Mode::Destroy, args, output).await,
        Commands::Status => {
            let (manifest, root) = Manifest::discover(&cwd)?;
            commands::status(&manifest, &root, output).await
        }
    }
}

async fn operation(
    cwd: &std::path::Path,
    mode: Mode,
    args: RunArgs,
    output: Output,
) -> Result<bool> {
    let (manifest, root) = Manifest::discover(cwd)?;
    let options = OperationOptions {
        dependencies: !args.no_deps,
        strict_versions: args.strict,
        phases: PhaseSelection::new(args.parameters, args.docker, args.stack),
        force: args.force,
        skip_build: args.skip_build,
        digest_retry: manifest.settings.digest_retry,
        serialize_config: manifest.settings.serialize_config,
    };
    commands::run_operation(&manifest, &root, mode, &args.units, options, output).await
}
