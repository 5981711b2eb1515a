// ABOUTME: Command module aggregator for the convoy CLI.
// ABOUTME: Re-exports the operation and status command handlers.

mod operation;
mod status;

pub use operation::run_operation;
pub use status::status;
