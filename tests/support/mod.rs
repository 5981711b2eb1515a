// ABOUTME: Test support utilities.
// ABOUTME: Provides scripted fake collaborators, a recording reporter, and run helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use convoy::collaborators::{
    BuildRequest, CollaboratorError, Collaborators, CommandOutput, ConfigScope, ConfigStore,
    ImageClient, InfraClient, ProcessRunner, PushOutput, StackInputs, StatusProbe,
};
use convoy::mode::Mode;
use convoy::options::{OperationOptions, RetryPolicy};
use convoy::pipeline::Phase;
use convoy::reporter::{OutputStream, ReportEvent, Reporter};
use convoy::scheduler::{OperationRequest, RunSummary, Scheduler};
use convoy::status::{EnvironmentStatus, ProcessStatus, StatusSnapshot};
use convoy::types::{Digest, ImageRef, UnitId};
use convoy::unit::{ImageSpec, Unit, derive_destroy_dependencies};
use nonempty::NonEmpty;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("convoy=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const DIGEST: &str = "sha256:4f2a9c";

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub unit: String,
    pub operation: &'static str,
}

/// Scripted in-memory implementation of every collaborator.
#[derive(Default)]
pub struct FakeCollaborators {
    calls: Mutex<Vec<Call>>,
    exit_codes: HashMap<(String, &'static str), i32>,
    rejected: HashSet<(String, &'static str)>,
    statuses: HashMap<String, EnvironmentStatus>,
    probe_failures: HashSet<String>,
    up_to_date: HashSet<(String, Phase)>,
    /// Attempt on which a digest becomes visible; `None` means never.
    visible_on_attempt: Option<u32>,
    verify_attempts: Mutex<HashMap<String, u32>>,
    deployed_config: BTreeMap<String, String>,
    apply_delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    applied: Mutex<HashMap<String, StackInputs>>,
}

impl FakeCollaborators {
    pub fn new() -> Self {
        Self {
            visible_on_attempt: Some(1),
            ..Default::default()
        }
    }

    /// Make `operation` for `unit` exit with `code`.
    pub fn exit_code(mut self, unit: &str, operation: &'static str, code: i32) -> Self {
        self.exit_codes.insert((unit.to_string(), operation), code);
        self
    }

    /// Make `operation` for `unit` return a collaborator error.
    pub fn reject(mut self, unit: &str, operation: &'static str) -> Self {
        self.rejected.insert((unit.to_string(), operation));
        self
    }

    pub fn status(mut self, unit: &str, status: EnvironmentStatus) -> Self {
        self.statuses.insert(unit.to_string(), status);
        self
    }

    pub fn probe_fails(mut self, unit: &str) -> Self {
        self.probe_failures.insert(unit.to_string());
        self
    }

    pub fn up_to_date(mut self, unit: &str, phase: Phase) -> Self {
        self.up_to_date.insert((unit.to_string(), phase));
        self
    }

    pub fn digest_visible_on(mut self, attempt: Option<u32>) -> Self {
        self.visible_on_attempt = attempt;
        self
    }

    pub fn deployed_config(mut self, key: &str, value: &str) -> Self {
        self.deployed_config
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            probe: self.clone(),
            config: self.clone(),
            images: self.clone(),
            infra: self.clone(),
            runner: Arc::new(ProcessRunner),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self, unit: &str) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| c.unit == unit)
            .map(|c| c.operation)
            .collect()
    }

    pub fn count(&self, unit: &str, operation: &str) -> usize {
        self.operations(unit)
            .into_iter()
            .filter(|op| *op == operation)
            .count()
    }

    /// Position of the first call made for `unit`.
    pub fn first_call(&self, unit: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.unit == unit)
    }

    /// Position of the last call made for `unit`.
    pub fn last_call(&self, unit: &str) -> Option<usize> {
        self.calls().iter().rposition(|c| c.unit == unit)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn applied_inputs(&self, unit: &str) -> Option<StackInputs> {
        self.applied.lock().unwrap().get(unit).cloned()
    }

    fn record(&self, unit: &str, operation: &'static str) -> Result<i32, CollaboratorError> {
        self.calls.lock().unwrap().push(Call {
            unit: unit.to_string(),
            operation,
        });
        let key = (unit.to_string(), operation);
        if self.rejected.contains(&key) {
            return Err(CollaboratorError::rejected(operation, "scripted rejection"));
        }
        Ok(self.exit_codes.get(&key).copied().unwrap_or(0))
    }

    fn output(&self, unit: &str, operation: &'static str) -> Result<CommandOutput, CollaboratorError> {
        let code = self.record(unit, operation)?;
        Ok(CommandOutput {
            exit_code: code,
            stdout: format!("{operation} {unit}\n"),
            stderr: String::new(),
        })
    }
}

#[async_trait]
impl StatusProbe for FakeCollaborators {
    async fn check_status(&self, unit: &Unit) -> Result<EnvironmentStatus, CollaboratorError> {
        if self.probe_failures.contains(unit.id.as_str()) {
            return Err(CollaboratorError::rejected("status", "probe unavailable"));
        }
        Ok(self
            .statuses
            .get(unit.id.as_str())
            .copied()
            .unwrap_or(EnvironmentStatus::NotDeployed))
    }

    async fn phase_up_to_date(&self, unit: &Unit, phase: Phase) -> Result<bool, CollaboratorError> {
        Ok(self.up_to_date.contains(&(unit.id.to_string(), phase)))
    }
}

#[async_trait]
impl ConfigStore for FakeCollaborators {
    async fn init_config(&self, unit: &Unit) -> Result<(), CollaboratorError> {
        self.record(unit.id.as_str(), "config_init").map(|_| ())
    }

    async fn materialize_config(&self, unit: &Unit) -> Result<(), CollaboratorError> {
        self.record(unit.id.as_str(), "config_materialize").map(|_| ())
    }

    async fn read_deployed_config(
        &self,
        unit: &Unit,
    ) -> Result<BTreeMap<String, String>, CollaboratorError> {
        self.record(unit.id.as_str(), "config_read")?;
        Ok(self.deployed_config.clone())
    }

    async fn delete_config(&self, unit: &Unit, scope: ConfigScope) -> Result<(), CollaboratorError> {
        let operation = match scope {
            ConfigScope::Unit => "config_delete",
            ConfigScope::Shared => "config_delete_shared",
        };
        self.record(unit.id.as_str(), operation).map(|_| ())
    }
}

#[async_trait]
impl ImageClient for FakeCollaborators {
    async fn build_image(
        &self,
        unit: &Unit,
        _request: &BuildRequest,
    ) -> Result<CommandOutput, CollaboratorError> {
        self.output(unit.id.as_str(), "build")
    }

    async fn push_image(&self, unit: &Unit, _image: &ImageRef) -> Result<PushOutput, CollaboratorError> {
        let output = self.output(unit.id.as_str(), "push")?;
        let digest = output
            .is_success()
            .then(|| Digest::parse(DIGEST).unwrap());
        Ok(PushOutput { output, digest })
    }

    async fn login(&self, registry: &str) -> Result<(), CollaboratorError> {
        self.record(registry, "login").map(|_| ())
    }

    async fn verify_digest_visible(
        &self,
        unit: &Unit,
        _image: &ImageRef,
        _digest: &Digest,
    ) -> Result<bool, CollaboratorError> {
        self.record(unit.id.as_str(), "verify_digest")?;
        let mut attempts = self.verify_attempts.lock().unwrap();
        let attempt = attempts.entry(unit.id.to_string()).or_default();
        *attempt += 1;
        Ok(self.visible_on_attempt.is_some_and(|n| *attempt >= n))
    }

    async fn sync_base_image(
        &self,
        unit: &Unit,
        _base: &ImageRef,
    ) -> Result<CommandOutput, CollaboratorError> {
        self.output(unit.id.as_str(), "sync_base")
    }

    async fn delete_repository(
        &self,
        unit: &Unit,
        _repository: &ImageRef,
    ) -> Result<CommandOutput, CollaboratorError> {
        self.output(unit.id.as_str(), "delete_repository")
    }
}

#[async_trait]
impl InfraClient for FakeCollaborators {
    async fn apply(&self, unit: &Unit, inputs: &StackInputs) -> Result<CommandOutput, CollaboratorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.applied
            .lock()
            .unwrap()
            .insert(unit.id.to_string(), inputs.clone());
        self.output(unit.id.as_str(), "apply")
    }

    async fn destroy(&self, unit: &Unit) -> Result<CommandOutput, CollaboratorError> {
        self.output(unit.id.as_str(), "destroy")
    }
}

/// Reporter that keeps every event for later inspection.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Process statuses reported for `unit`, collapsing repeats.
    pub fn process_history(&self, unit: &str) -> Vec<ProcessStatus> {
        let mut history: Vec<ProcessStatus> = Vec::new();
        for event in self.events() {
            if let ReportEvent::Status(snapshot) = event
                && snapshot.unit.as_str() == unit
                && history.last() != Some(&snapshot.process)
            {
                history.push(snapshot.process);
            }
        }
        history
    }

    pub fn output(&self, unit: &str) -> Vec<(OutputStream, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Output { unit: u, stream, text } if u.as_str() == unit => {
                    Some((stream, text))
                }
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn status(&self, snapshot: &StatusSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(ReportEvent::Status(snapshot.clone()));
    }

    fn output(&self, unit: &UnitId, stream: OutputStream, text: &str) {
        self.events.lock().unwrap().push(ReportEvent::Output {
            unit: unit.clone(),
            stream,
            text: text.to_string(),
        });
    }
}

pub fn id(s: &str) -> UnitId {
    UnitId::new(s).unwrap()
}

/// A unit without image or hooks that depends on `deps` when deploying.
pub fn unit(name: &str, deps: &[&str]) -> Unit {
    let mut unit = Unit::new(id(name), format!("/nonexistent/convoy/{name}"));
    unit.deploy_dependencies = deps.iter().map(|d| id(d)).collect();
    unit
}

pub fn with_image(mut unit: Unit, repository: &str) -> Unit {
    unit.image = Some(ImageSpec {
        repository: ImageRef::parse(repository).unwrap(),
        base: None,
    });
    unit
}

/// Options for tests: no retry delay.
pub fn options() -> OperationOptions {
    OperationOptions {
        digest_retry: RetryPolicy::immediate(5),
        ..Default::default()
    }
}

/// Run `units` through a fresh scheduler.
pub async fn run(
    fakes: &Arc<FakeCollaborators>,
    mut units: Vec<Unit>,
    mode: Mode,
    options: OperationOptions,
) -> (RunSummary, Arc<RecordingReporter>) {
    init_tracing();
    derive_destroy_dependencies(&mut units);
    let reporter = Arc::new(RecordingReporter::default());
    let scheduler = Scheduler::new(fakes.collaborators(), reporter.clone());
    let summary = scheduler
        .run(OperationRequest {
            units: NonEmpty::from_vec(units).unwrap(),
            mode,
            options,
        })
        .await
        .unwrap();
    (summary, reporter)
}

pub fn process(summary: &RunSummary, unit: &str) -> ProcessStatus {
    summary.unit(unit).unwrap().process
}
