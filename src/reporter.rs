// ABOUTME: Outbound event stream consumed by a presentation layer.
// ABOUTME: Status snapshots plus per-unit command output, via channel or console.

use tokio::sync::mpsc;

use crate::output::Output;
use crate::status::StatusSnapshot;
use crate::types::UnitId;

/// Which stream a piece of unit output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
    /// Engine commentary about the unit (skipped phases, retries).
    Info,
}

/// Receives everything the engine reports while a run is in flight.
///
/// Called from concurrently running pipelines; implementations must not block.
pub trait Reporter: Send + Sync {
    fn status(&self, snapshot: &StatusSnapshot);

    fn output(&self, unit: &UnitId, stream: OutputStream, text: &str);
}

/// A single reported event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Status(StatusSnapshot),
    Output {
        unit: UnitId,
        stream: OutputStream,
        text: String,
    },
}

/// Forwards events to an unbounded channel for an external consumer.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ReportEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReportEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Reporter for ChannelReporter {
    fn status(&self, snapshot: &StatusSnapshot) {
        // A dropped receiver only means nobody is watching.
        let _ = self.sender.send(ReportEvent::Status(snapshot.clone()));
    }

    fn output(&self, unit: &UnitId, stream: OutputStream, text: &str) {
        let _ = self.sender.send(ReportEvent::Output {
            unit: unit.clone(),
            stream,
            text: text.to_string(),
        });
    }
}

/// Prints events through the CLI output formatter.
pub struct ConsoleReporter {
    output: Output,
}

impl ConsoleReporter {
    pub fn new(output: Output) -> Self {
        Self { output }
    }
}

impl Reporter for ConsoleReporter {
    fn status(&self, snapshot: &StatusSnapshot) {
        self.output.status(snapshot);
    }

    fn output(&self, unit: &UnitId, stream: OutputStream, text: &str) {
        match stream {
            OutputStream::Stdout | OutputStream::Info => self.output.unit_text(unit, text, false),
            OutputStream::Stderr => self.output.unit_text(unit, text, true),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn status(&self, _snapshot: &StatusSnapshot) {}

    fn output(&self, _unit: &UnitId, _stream: OutputStream, _text: &str) {}
}
