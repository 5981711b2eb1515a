// ABOUTME: Per-run operation options supplied by the caller.
// ABOUTME: Phase selection defaulting, dependency toggle, and digest retry policy.

use serde::Deserialize;
use std::time::Duration;

use crate::pipeline::Phase;

/// Which phases the caller asked for.
///
/// If no phase flag is set, every phase is selected and the selection is
/// marked implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSelection {
    parameters: bool,
    docker: bool,
    stack: bool,
    explicit: bool,
}

impl PhaseSelection {
    pub fn new(parameters: bool, docker: bool, stack: bool) -> Self {
        if !(parameters || docker || stack) {
            return Self::all();
        }
        Self {
            parameters,
            docker,
            stack,
            explicit: true,
        }
    }

    pub fn all() -> Self {
        Self {
            parameters: true,
            docker: true,
            stack: true,
            explicit: false,
        }
    }

    pub fn includes(&self, phase: Phase) -> bool {
        match phase {
            Phase::Parameters => self.parameters,
            Phase::Image => self.docker,
            Phase::Stack => self.stack,
            Phase::Cleanup => true,
        }
    }

    /// True when `phase` was named by the caller rather than defaulted.
    pub fn explicitly_requested(&self, phase: Phase) -> bool {
        self.explicit && self.includes(phase)
    }
}

impl Default for PhaseSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// Bounded fixed-delay retry used for digest visibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,
}

fn default_attempts() -> u32 {
    5
}

fn default_delay() -> Duration {
    Duration::from_secs(2)
}

impl RetryPolicy {
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: default_delay(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationOptions {
    /// Track declared dependencies. When off, every unit runs unordered.
    pub dependencies: bool,
    /// Skip phases the status probe reports as already up to date.
    pub strict_versions: bool,
    pub phases: PhaseSelection,
    /// Run phases even when `strict_versions` would skip them.
    pub force: bool,
    /// Reuse the existing local image instead of building it.
    pub skip_build: bool,
    pub digest_retry: RetryPolicy,
    /// Serialize configuration init and read-back across units.
    pub serialize_config: bool,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            dependencies: true,
            strict_versions: false,
            phases: PhaseSelection::all(),
            force: false,
            skip_build: false,
            digest_retry: RetryPolicy::default(),
            serialize_config: true,
        }
    }
}
