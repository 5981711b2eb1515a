// ABOUTME: Synchronous scheduler state machine: statuses, queues, and the blocking map.
// ABOUTME: Admission, completion, unblock emission, and the cancellation cascade.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::graph::BlockingMap;
use crate::mode::Mode;
use crate::reporter::{OutputStream, Reporter};
use crate::status::{EnvironmentStatus, ProcessStatus, StatusSnapshot};
use crate::types::UnitId;
use crate::unit::{DependencyTracking, Unit};

/// Result of one admission pass.
#[derive(Debug, Default)]
pub struct Admission {
    /// Units moved to PROCESSING whose pipelines must be launched now.
    pub launched: Vec<Unit>,
    /// Nothing is queued, in flight, or blocked.
    pub finished: bool,
}

/// Statuses, queues, and the blocking map of one run.
///
/// Owned by a single driver loop. Every unit is in at most one of
/// `to_process`, `processing`, and `completed`.
pub struct SchedulerState {
    mode: Mode,
    dependencies: bool,
    units: Vec<Unit>,
    index: HashMap<UnitId, usize>,
    blocking: BlockingMap,
    to_process: BTreeSet<UnitId>,
    processing: BTreeSet<UnitId>,
    completed: BTreeSet<UnitId>,
    registered: HashSet<UnitId>,
    reporter: Arc<dyn Reporter>,
}

impl SchedulerState {
    pub fn new(units: Vec<Unit>, mode: Mode, dependencies: bool, reporter: Arc<dyn Reporter>) -> Self {
        let index = units
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit.id.clone(), i))
            .collect();
        Self {
            mode,
            dependencies,
            units,
            index,
            blocking: BlockingMap::new(),
            to_process: BTreeSet::new(),
            processing: BTreeSet::new(),
            completed: BTreeSet::new(),
            registered: HashSet::new(),
            reporter,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    pub fn blocking(&self) -> &BlockingMap {
        &self.blocking
    }

    pub fn to_process(&self) -> &BTreeSet<UnitId> {
        &self.to_process
    }

    pub fn processing(&self) -> &BTreeSet<UnitId> {
        &self.processing
    }

    pub fn completed(&self) -> &BTreeSet<UnitId> {
        &self.completed
    }

    pub fn into_units(self) -> Vec<Unit> {
        self.units
    }

    pub fn is_finished(&self) -> bool {
        self.to_process.is_empty()
            && self.processing.is_empty()
            && (!self.dependencies || self.blocking.is_empty())
    }

    fn emit(&self, index: usize) {
        let unit = &self.units[index];
        self.reporter.status(&StatusSnapshot::now(
            unit.id.clone(),
            unit.process_status,
            unit.environment_status,
        ));
    }

    /// Overwrite a unit's environment status, reporting the change.
    pub fn set_environment(&mut self, id: &UnitId, status: EnvironmentStatus) {
        let Some(&index) = self.index.get(id) else {
            return;
        };
        if self.units[index].environment_status != status {
            self.units[index].environment_status = status;
            self.emit(index);
        }
    }

    /// The only writer of process status.
    ///
    /// Illegal transitions are ignored. Returns whether the status changed.
    pub fn set_status(&mut self, id: &UnitId, next: ProcessStatus) -> bool {
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        let current = self.units[index].process_status;
        if !current.can_transition_to(next) {
            tracing::debug!(unit = %id, "ignoring transition {} -> {}", current, next);
            return false;
        }

        self.units[index].process_status = next;
        self.emit(index);

        if next.releases_dependents() {
            self.emit_unblock(id);
        }
        if next.is_terminal() {
            self.to_process.remove(id);
            self.processing.remove(id);
            self.completed.insert(id.clone());
        }
        if next == ProcessStatus::Ready {
            self.to_process.insert(id.clone());
            if self.dependencies {
                self.register_dependencies(id);
            }
        }
        true
    }

    /// Remove `id` as a blocker everywhere; dependents left with nothing to
    /// wait on become READY.
    fn emit_unblock(&mut self, id: &UnitId) {
        self.blocking.remove_entry(id);
        for dependent in self.blocking.release(id) {
            if self.status(&dependent) == Some(ProcessStatus::HasPrereqs) {
                self.set_status(&dependent, ProcessStatus::Ready);
            }
        }
    }

    fn status(&self, id: &UnitId) -> Option<ProcessStatus> {
        self.unit(id).map(Unit::process_status)
    }

    /// Record `id`'s dependencies, and theirs, in the blocking map.
    ///
    /// Each unit registers once. Settled blockers are not recorded; a
    /// blocker that already failed cancels the registering unit.
    fn register_dependencies(&mut self, id: &UnitId) {
        let mut pending = vec![id.clone()];

        while let Some(current) = pending.pop() {
            if !self.registered.insert(current.clone()) {
                continue;
            }
            let Some(unit) = self.unit(&current) else {
                continue;
            };
            if unit.global {
                continue;
            }
            let dependencies = self.mode.dependencies(unit).to_vec();

            for dependency in dependencies {
                let Some(blocker) = self.unit(&dependency) else {
                    continue;
                };
                if blocker.global {
                    continue;
                }
                let status = blocker.process_status;
                if status.releases_dependents() {
                    continue;
                }
                if status.poisons_dependents() {
                    tracing::info!(unit = %current, "cancelled: {} already {}", dependency, status);
                    self.cancel_unit(&current);
                    break;
                }
                self.blocking.add(&current, &dependency);
                pending.push(dependency);
            }
        }
    }

    /// Seed every unit's status before the first admission.
    ///
    /// Out-of-scope units are skipped first so they never block anything.
    pub fn initialize(&mut self) {
        let ids: Vec<UnitId> = self.units.iter().map(|u| u.id.clone()).collect();

        for id in &ids {
            if self.unit(id).is_some_and(|u| u.skip) {
                self.set_status(id, ProcessStatus::Skipped);
            }
        }

        for id in &ids {
            let Some(&index) = self.index.get(id) else {
                continue;
            };
            if self.units[index].skip {
                continue;
            }

            if !self.dependencies && !self.mode.dependencies(&self.units[index]).is_empty() {
                self.units[index].dependency_tracking = DependencyTracking::Skipped;
                self.reporter.output(
                    id,
                    OutputStream::Info,
                    "dependencies SKIPPED: dependency tracking is disabled",
                );
            }

            if self.set_status(id, ProcessStatus::Ready) && self.blocking.is_blocked(id) {
                self.set_status(id, ProcessStatus::HasPrereqs);
            }
        }
    }

    /// Move every admissible unit to PROCESSING, in declaration order.
    ///
    /// Global units wait until every other unit is terminal, and are
    /// cancelled instead if any of them failed or was cancelled.
    pub fn admit(&mut self) -> Admission {
        let candidates: Vec<(UnitId, bool)> = self
            .units
            .iter()
            .filter(|u| self.to_process.contains(&u.id) && !self.processing.contains(&u.id))
            .map(|u| (u.id.clone(), u.global))
            .collect();

        let mut launched = Vec::new();
        let mut globals = Vec::new();
        for (id, global) in candidates {
            if global {
                globals.push(id);
                continue;
            }
            if self.dependencies && self.blocking.is_blocked(&id) {
                continue;
            }
            if let Some(unit) = self.start(&id) {
                launched.push(unit);
            }
        }

        if !globals.is_empty() && self.others_settled() {
            let poisoned = self
                .units
                .iter()
                .any(|u| !u.global && u.process_status.poisons_dependents());
            for id in globals {
                if poisoned {
                    self.cancel_unit(&id);
                } else if let Some(unit) = self.start(&id) {
                    launched.push(unit);
                }
            }
        }

        Admission {
            launched,
            finished: self.is_finished(),
        }
    }

    fn others_settled(&self) -> bool {
        self.units
            .iter()
            .filter(|u| !u.global)
            .all(|u| u.process_status.is_terminal())
    }

    fn start(&mut self, id: &UnitId) -> Option<Unit> {
        if !self.set_status(id, ProcessStatus::Processing) {
            return None;
        }
        self.to_process.remove(id);
        self.processing.insert(id.clone());
        if self.mode == Mode::Deploy {
            self.set_environment(id, EnvironmentStatus::Initializing);
        }
        self.unit(id).cloned()
    }

    /// Record a pipeline result.
    ///
    /// Results for units that are not in flight are discarded. Returns
    /// whether the result was applied.
    pub fn on_complete(
        &mut self,
        id: &UnitId,
        exit_code: i32,
        environment: Option<EnvironmentStatus>,
    ) -> bool {
        if !self.processing.contains(id) {
            tracing::debug!(unit = %id, "discarding result for unit not in flight");
            return false;
        }
        if let Some(environment) = environment {
            self.set_environment(id, environment);
        }

        if exit_code == 0 {
            self.set_status(id, ProcessStatus::Completed);
        } else {
            tracing::warn!(unit = %id, exit_code, "pipeline failed");
            self.set_status(id, ProcessStatus::Failed);
            self.cancel(id);
        }
        true
    }

    /// Cancel everything that transitively waits on `origin`.
    ///
    /// Cancelled units never reach PROCESSING. Units that are already
    /// terminal are left alone.
    pub fn cancel(&mut self, origin: &UnitId) -> Vec<UnitId> {
        let mut cancelled = Vec::new();
        let mut worklist = vec![origin.clone()];

        while let Some(blocker) = worklist.pop() {
            for dependent in self.blocking.dependents_of(&blocker) {
                self.blocking.remove_entry(&dependent);
                if self.set_status(&dependent, ProcessStatus::Cancelled) {
                    tracing::info!(unit = %dependent, "cancelled: waits on {}", blocker);
                    self.set_environment(&dependent, EnvironmentStatus::Cancelled);
                    cancelled.push(dependent.clone());
                }
                worklist.push(dependent);
            }
        }
        cancelled
    }

    fn cancel_unit(&mut self, id: &UnitId) {
        self.blocking.remove_entry(id);
        if self.set_status(id, ProcessStatus::Cancelled) {
            self.set_environment(id, EnvironmentStatus::Cancelled);
        }
        self.cancel(id);
    }

    /// Cancel queued units that can no longer be admitted.
    ///
    /// Only meaningful when nothing is in flight; clears the blocking map.
    pub fn cancel_stranded(&mut self) -> Vec<UnitId> {
        if !self.processing.is_empty() {
            return Vec::new();
        }
        let stranded: Vec<UnitId> = self.to_process.iter().cloned().collect();
        for id in &stranded {
            tracing::warn!(unit = %id, "cancelling unit that can never be admitted");
            self.cancel_unit(id);
        }
        self.blocking = BlockingMap::new();
        stranded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    fn chain(mode: Mode, dependencies: bool) -> SchedulerState {
        let mut a = Unit::new(id("a"), ".");
        let mut b = Unit::new(id("b"), ".");
        let c = {
            let mut c = Unit::new(id("c"), ".");
            c.deploy_dependencies = vec![id("b")];
            c
        };
        b.deploy_dependencies = vec![id("a")];
        a.destroy_dependencies = vec![id("b")];
        b.destroy_dependencies = vec![id("c")];
        SchedulerState::new(vec![a, b, c], mode, dependencies, Arc::new(NullReporter))
    }

    fn launched_ids(admission: &Admission) -> Vec<&str> {
        admission.launched.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn initialize_registers_whole_chain() {
        let mut state = chain(Mode::Deploy, true);
        state.initialize();

        assert_eq!(state.status(&id("a")), Some(ProcessStatus::Ready));
        assert_eq!(state.status(&id("b")), Some(ProcessStatus::HasPrereqs));
        assert_eq!(state.status(&id("c")), Some(ProcessStatus::HasPrereqs));
        assert_eq!(state.blocking().len(), 2);
        assert_eq!(state.to_process().len(), 3);
    }

    #[test]
    fn completion_releases_next_unit() {
        let mut state = chain(Mode::Deploy, true);
        state.initialize();

        let first = state.admit();
        assert_eq!(launched_ids(&first), ["a"]);
        assert!(!first.finished);

        assert!(state.on_complete(&id("a"), 0, None));
        assert_eq!(state.status(&id("b")), Some(ProcessStatus::Ready));
        assert!(!state.blocking().is_blocked(&id("b")));

        let second = state.admit();
        assert_eq!(launched_ids(&second), ["b"]);
    }

    #[test]
    fn failure_cancels_transitive_dependents() {
        let mut state = chain(Mode::Deploy, true);
        state.initialize();
        state.admit();

        state.on_complete(&id("a"), 1, None);

        assert_eq!(state.status(&id("a")), Some(ProcessStatus::Failed));
        assert_eq!(state.status(&id("b")), Some(ProcessStatus::Cancelled));
        assert_eq!(state.status(&id("c")), Some(ProcessStatus::Cancelled));
        assert!(state.blocking().is_empty());

        let admission = state.admit();
        assert!(admission.launched.is_empty());
        assert!(admission.finished);
    }

    #[test]
    fn destroy_runs_consumers_first() {
        let mut state = chain(Mode::Destroy, true);
        state.initialize();
        assert_eq!(launched_ids(&state.admit()), ["c"]);
    }

    #[test]
    fn repeated_completion_is_ignored() {
        let mut state = chain(Mode::Deploy, true);
        state.initialize();
        state.admit();
        assert!(state.on_complete(&id("a"), 0, None));
        state.admit();

        assert!(!state.on_complete(&id("a"), 0, None));
        assert_eq!(state.status(&id("b")), Some(ProcessStatus::Processing));
        assert!(state.admit().launched.is_empty());
    }

    #[test]
    fn skipped_units_do_not_block() {
        let mut state = chain(Mode::Deploy, true);
        state.units[0].skip = true;
        state.initialize();

        assert_eq!(state.status(&id("a")), Some(ProcessStatus::Skipped));
        assert_eq!(launched_ids(&state.admit()), ["b"]);
    }

    #[test]
    fn disabled_dependencies_admit_everything() {
        let mut state = chain(Mode::Deploy, false);
        state.initialize();

        assert_eq!(launched_ids(&state.admit()), ["a", "b", "c"]);
        assert_eq!(
            state.unit(&id("b")).map(Unit::dependency_tracking),
            Some(DependencyTracking::Skipped)
        );
        assert_eq!(
            state.unit(&id("a")).map(Unit::dependency_tracking),
            Some(DependencyTracking::Tracked)
        );
    }

    #[test]
    fn global_unit_waits_for_everything_else() {
        let mut state = chain(Mode::Deploy, true);
        let mut global = Unit::new(id("shared"), ".");
        global.global = true;
        state.index.insert(global.id.clone(), state.units.len());
        state.units.insert(state.units.len(), global);
        state.initialize();

        assert_eq!(launched_ids(&state.admit()), ["a"]);
        state.on_complete(&id("a"), 0, None);
        assert_eq!(launched_ids(&state.admit()), ["b"]);
        state.on_complete(&id("b"), 0, None);
        assert_eq!(launched_ids(&state.admit()), ["c"]);
        state.on_complete(&id("c"), 0, None);
        assert_eq!(launched_ids(&state.admit()), ["shared"]);
    }

    #[test]
    fn global_unit_cancelled_after_failure() {
        let mut state = chain(Mode::Deploy, true);
        let mut global = Unit::new(id("shared"), ".");
        global.global = true;
        state.index.insert(global.id.clone(), state.units.len());
        state.units.push(global);
        state.initialize();

        state.admit();
        state.on_complete(&id("a"), 2, None);
        let admission = state.admit();

        assert!(admission.launched.is_empty());
        assert!(admission.finished);
        assert_eq!(state.status(&id("shared")), Some(ProcessStatus::Cancelled));
    }

    #[test]
    fn launch_resets_environment_for_deploy() {
        let mut state = chain(Mode::Deploy, true);
        state.set_environment(&id("a"), EnvironmentStatus::UpToDate);
        state.initialize();
        state.admit();
        assert_eq!(
            state.unit(&id("a")).map(Unit::environment_status),
            Some(EnvironmentStatus::Initializing)
        );

        state.on_complete(&id("a"), 0, Some(EnvironmentStatus::UpToDate));
        assert_eq!(
            state.unit(&id("a")).map(Unit::environment_status),
            Some(EnvironmentStatus::UpToDate)
        );
    }
}
