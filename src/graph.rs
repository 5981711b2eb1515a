// ABOUTME: Blocking map from a waiting unit to the units it still waits on.
// ABOUTME: Entries exist only while non-empty; also validates graphs for cycles and unknown ids.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::mode::Mode;
use crate::types::UnitId;
use crate::unit::Unit;

/// Errors from validating a dependency graph before a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: UnitId, dependency: UnitId },

    #[error("unit '{0}' depends on itself")]
    SelfDependency(UnitId),

    #[error("{mode} dependency cycle: {}", render_path(.path))]
    Cycle { mode: Mode, path: Vec<UnitId> },
}

fn render_path(path: &[UnitId]) -> String {
    path.iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Maps a blocked unit to the set of units it is waiting on.
///
/// An entry is present iff its waiting set is non-empty: the entry is
/// deleted in the same call that removes its last blocker.
#[derive(Debug, Default, Clone)]
pub struct BlockingMap {
    entries: BTreeMap<UnitId, BTreeSet<UnitId>>,
}

impl BlockingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `blocked` waits on `blocker`. Returns false if already recorded.
    pub fn add(&mut self, blocked: &UnitId, blocker: &UnitId) -> bool {
        self.entries
            .entry(blocked.clone())
            .or_default()
            .insert(blocker.clone())
    }

    pub fn is_blocked(&self, unit: &UnitId) -> bool {
        self.entries.contains_key(unit)
    }

    pub fn waiting_on(&self, unit: &UnitId) -> Option<&BTreeSet<UnitId>> {
        self.entries.get(unit)
    }

    /// Drop `unit`'s own entry; it no longer waits on anything.
    pub fn remove_entry(&mut self, unit: &UnitId) -> Option<BTreeSet<UnitId>> {
        self.entries.remove(unit)
    }

    /// Remove `blocker` from every waiting set.
    ///
    /// Returns the units whose entries became empty and were deleted.
    /// Calling this again for the same blocker releases nothing.
    pub fn release(&mut self, blocker: &UnitId) -> Vec<UnitId> {
        let mut unblocked = Vec::new();
        self.entries.retain(|blocked, waiting| {
            if waiting.remove(blocker) && waiting.is_empty() {
                unblocked.push(blocked.clone());
            }
            !waiting.is_empty()
        });
        unblocked
    }

    /// Units whose waiting set contains `blocker`.
    pub fn dependents_of(&self, blocker: &UnitId) -> Vec<UnitId> {
        self.entries
            .iter()
            .filter(|(_, waiting)| waiting.contains(blocker))
            .map(|(blocked, _)| blocked.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &BTreeSet<UnitId>)> {
        self.entries.iter()
    }
}

/// Reject unknown ids, self-edges, and cycles in `mode`'s dependency lists.
///
/// Global units are excluded from dependency accounting and not checked.
pub fn validate(units: &[Unit], mode: Mode) -> Result<(), GraphError> {
    let by_id: HashMap<&UnitId, &Unit> = units.iter().map(|u| (&u.id, u)).collect();

    for unit in units.iter().filter(|u| !u.global) {
        for dependency in mode.dependencies(unit) {
            if dependency == &unit.id {
                return Err(GraphError::SelfDependency(unit.id.clone()));
            }
            if !by_id.contains_key(dependency) {
                return Err(GraphError::UnknownDependency {
                    unit: unit.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a UnitId,
        by_id: &HashMap<&'a UnitId, &'a Unit>,
        mode: Mode,
        marks: &mut HashMap<&'a UnitId, Mark>,
        stack: &mut Vec<&'a UnitId>,
    ) -> Result<(), GraphError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|s| *s == id).unwrap_or(0);
                let mut path: Vec<UnitId> = stack[start..].iter().map(|s| (*s).clone()).collect();
                path.push(id.clone());
                return Err(GraphError::Cycle { mode, path });
            }
            None => {}
        }

        let Some(unit) = by_id.get(id) else {
            return Ok(());
        };
        if unit.global {
            marks.insert(id, Mark::Done);
            return Ok(());
        }

        marks.insert(id, Mark::Visiting);
        stack.push(id);
        for dependency in mode.dependencies(unit) {
            if let Some((key, _)) = by_id.get_key_value(dependency) {
                visit(*key, by_id, mode, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for unit in units {
        visit(&unit.id, &by_id, mode, &mut marks, &mut stack)?;
    }
    Ok(())
}
