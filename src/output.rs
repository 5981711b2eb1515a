// ABOUTME: Output formatting for CLI feedback and streamed unit status.
// ABOUTME: Supports normal, quiet (CI), and JSON-lines output modes.

use serde::Serialize;
use std::time::Instant;

use crate::scheduler::RunSummary;
use crate::status::StatusSnapshot;
use crate::types::UnitId;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one unit status change.
    pub fn status(&self, snapshot: &StatusSnapshot) {
        match self.mode {
            OutputMode::Normal => println!(
                "  {:<24} {:<12} {}",
                snapshot.unit, snapshot.process, snapshot.environment
            ),
            OutputMode::Quiet => {}
            OutputMode::Json => emit_json(&StatusEvent {
                event: "status",
                snapshot,
            }),
        }
    }

    /// Print text a unit's external commands produced.
    pub fn unit_text(&self, unit: &UnitId, text: &str, is_error: bool) {
        match self.mode {
            OutputMode::Normal => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    if is_error {
                        eprintln!("  [{unit}] {line}");
                    } else {
                        println!("  [{unit}] {line}");
                    }
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => emit_json(&OutputEvent {
                event: "output",
                unit,
                stream: if is_error { "stderr" } else { "stdout" },
                text,
            }),
        }
    }

    /// Print the final state of every unit.
    pub fn summary(&self, summary: &RunSummary) {
        match self.mode {
            OutputMode::Normal => {
                println!();
                for report in &summary.units {
                    println!(
                        "  {:<24} {:<12} {}",
                        report.unit, report.process, report.environment
                    );
                    if let Some(message) = &report.message {
                        println!("      {message}");
                    }
                }
                println!(
                    "{} completed, {} failed, {} cancelled, {} skipped",
                    summary.completed(),
                    summary.failed(),
                    summary.cancelled(),
                    summary.skipped()
                );
            }
            OutputMode::Quiet => {
                for report in summary.units.iter().filter(|r| r.message.is_some()) {
                    eprintln!(
                        "{}: {}",
                        report.unit,
                        report.message.as_deref().unwrap_or_default()
                    );
                }
            }
            OutputMode::Json => emit_json(&SummaryEvent {
                event: "summary",
                summary,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => emit_json(&MessageEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit_json(&MessageEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => emit_json(&MessageEvent {
                event: "error",
                message,
                duration_secs: self.duration(),
            }),
        }
    }
}

fn emit_json<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct StatusEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    snapshot: &'a StatusSnapshot,
}

#[derive(Serialize)]
struct OutputEvent<'a> {
    event: &'a str,
    unit: &'a UnitId,
    stream: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct SummaryEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    summary: &'a RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct MessageEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
