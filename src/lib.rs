// ABOUTME: Library root for convoy - exposes the orchestration engine and its collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod collaborators;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod mode;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod reporter;
pub mod scheduler;
pub mod shell;
pub mod status;
pub mod types;
pub mod unit;
