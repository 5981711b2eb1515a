// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "Dependency-aware deploy and destroy for multi-unit applications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new convoy.yml manifest
    Init {
        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },

    /// Deploy units in dependency order
    Deploy(RunArgs),

    /// Destroy units, dependents first
    Destroy(RunArgs),

    /// Show the environment status of every unit
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Units to include (default: all)
    pub units: Vec<String>,

    /// Ignore declared dependencies and run every unit at once
    #[arg(long)]
    pub no_deps: bool,

    /// Skip phases that are already up to date
    #[arg(long)]
    pub strict: bool,

    /// Run the parameters phase
    #[arg(long)]
    pub parameters: bool,

    /// Run the image phase
    #[arg(long)]
    pub docker: bool,

    /// Run the stack phase
    #[arg(long)]
    pub stack: bool,

    /// Run phases even if they are up to date, and rebuild without cache
    #[arg(long)]
    pub force: bool,

    /// Push the existing local image instead of building it
    #[arg(long)]
    pub skip_build: bool,
}
