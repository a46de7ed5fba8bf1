//! Authoritative in-owner child registry.
//!
//! Descriptors are keyed by startup index, which fixes the total order in
//! which children were first started; iterating the map forward yields
//! startup order and backward yields shutdown order. Secondary indexes
//! resolve ids, pids, shutdown groups, and reverse bindings.

use crate::restart::RestartWindow;
use crate::spec::ChildSpec;
use crate::types::{ChildPid, ChildRef};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One tracked child together with its runtime handles
pub(crate) struct ChildState {
    pub(crate) spec: ChildSpec,
    /// `None` for an ignored child
    pub(crate) pid: Option<ChildPid>,
    /// Assigned at first successful start, immutable across restarts
    pub(crate) startup_index: u64,
    /// `binds_to` resolved to startup indexes at registration; indexes are
    /// stable across restarts, so bindings survive pid changes
    pub(crate) deps: BTreeSet<u64>,
    /// Monitor on the wrapper task; resolves whether the task completed or
    /// was aborted
    pub(crate) join: Option<JoinHandle<()>>,
    /// Cooperative stop signal for the child body
    pub(crate) cancel: Option<CancellationToken>,
    /// Pending timeout timer
    pub(crate) timer: Option<JoinHandle<()>>,
    /// Per-child restart counters; survive the child across restarts
    pub(crate) window: RestartWindow,
}

/// The parent's child bookkeeping.
///
/// Purely owner-local; all mutation happens on the owner task.
#[derive(Default)]
pub(crate) struct State {
    children: BTreeMap<u64, ChildState>,
    ids: HashMap<String, u64>,
    pids: HashMap<ChildPid, u64>,
    groups: HashMap<String, BTreeSet<u64>>,
    /// index → indexes of younger children bound to it
    bound_by: HashMap<u64, BTreeSet<u64>>,
    next_index: u64,
}

impl State {
    /// Hands out the next startup index; indexes are never reused, even
    /// across [`State::reinitialize`].
    pub(crate) fn allocate_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    pub(crate) fn register(&mut self, child: ChildState) {
        let index = child.startup_index;
        if let Some(id) = &child.spec.id {
            self.ids.insert(id.clone(), index);
        }
        if let Some(pid) = child.pid {
            self.pids.insert(pid, index);
        }
        if let Some(group) = &child.spec.shutdown_group {
            self.groups.entry(group.clone()).or_default().insert(index);
        }
        for dep in &child.deps {
            self.bound_by.entry(*dep).or_default().insert(index);
        }
        self.children.insert(index, child);
    }

    pub(crate) fn resolve(&self, child: &ChildRef) -> Option<u64> {
        match child {
            ChildRef::Id(id) => self.ids.get(id).copied(),
            ChildRef::Pid(pid) => self.pids.get(pid).copied(),
        }
    }

    pub(crate) fn get(&self, index: u64) -> Option<&ChildState> {
        self.children.get(&index)
    }

    pub(crate) fn get_mut(&mut self, index: u64) -> Option<&mut ChildState> {
        self.children.get_mut(&index)
    }

    pub(crate) fn child(&self, child: &ChildRef) -> Option<&ChildState> {
        self.resolve(child).and_then(|index| self.get(index))
    }

    pub(crate) fn contains(&self, child: &ChildRef) -> bool {
        self.resolve(child).is_some()
    }

    pub(crate) fn has_index(&self, index: u64) -> bool {
        self.children.contains_key(&index)
    }

    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    /// Children in ascending startup order
    pub(crate) fn children(&self) -> impl Iterator<Item = &ChildState> {
        self.children.values()
    }

    pub(crate) fn group_members(&self, group: &str) -> Vec<&ChildState> {
        self.groups
            .get(group)
            .into_iter()
            .flatten()
            .filter_map(|index| self.children.get(index))
            .collect()
    }

    /// Applies `f` to a child's metadata and returns the new value together
    /// with the child's pid, for the discovery index notification.
    pub(crate) fn update_meta(
        &mut self,
        child: &ChildRef,
        f: impl FnOnce(Value) -> Value,
    ) -> Option<(Value, Option<ChildPid>)> {
        let index = self.resolve(child)?;
        let child = self.children.get_mut(&index)?;
        let old = std::mem::replace(&mut child.spec.meta, Value::Null);
        child.spec.meta = f(old);
        Some((child.spec.meta.clone(), child.pid))
    }

    /// Removes `child` and everything that must go down with it: the
    /// transitive closure under reverse bindings and shutdown-group
    /// membership, in ascending startup order.
    ///
    /// This is the fundamental primitive: any lifecycle event that takes one
    /// child down must also take its bound siblings and its group mates down.
    pub(crate) fn pop_with_bound_siblings(&mut self, child: &ChildRef) -> Vec<ChildState> {
        let Some(start) = self.resolve(child) else {
            return Vec::new();
        };

        let mut closure = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            if !closure.insert(index) {
                continue;
            }
            if let Some(dependents) = self.bound_by.get(&index) {
                stack.extend(dependents.iter().copied());
            }
            if let Some(group) = self
                .children
                .get(&index)
                .and_then(|c| c.spec.shutdown_group.as_ref())
            {
                if let Some(members) = self.groups.get(group) {
                    stack.extend(members.iter().copied());
                }
            }
        }

        let mut popped = Vec::with_capacity(closure.len());
        for index in closure {
            if let Some(child) = self.remove(index) {
                popped.push(child);
            }
        }
        popped
    }

    /// Removes every child transitively bound to any of `indexes`; the
    /// indexes themselves need not be present. Used to roll back restarted
    /// children whose dependencies are still stopped.
    pub(crate) fn pop_bound_to(&mut self, indexes: &BTreeSet<u64>) -> Vec<ChildState> {
        let mut dependents = BTreeSet::new();
        let mut stack: Vec<u64> = indexes.iter().copied().collect();
        while let Some(index) = stack.pop() {
            if let Some(bound) = self.bound_by.get(&index) {
                for &b in bound {
                    if self.children.contains_key(&b) && dependents.insert(b) {
                        stack.push(b);
                    }
                }
            }
        }

        let mut popped = Vec::with_capacity(dependents.len());
        for index in dependents {
            if let Some(child) = self.remove(index) {
                popped.push(child);
            }
        }
        popped
    }

    /// Removes every child, ascending startup order, and reinitializes the
    /// bookkeeping.
    pub(crate) fn pop_all(&mut self) -> Vec<ChildState> {
        let children = std::mem::take(&mut self.children);
        self.reinitialize();
        children.into_values().collect()
    }

    /// Empties all bookkeeping while preserving the startup counter, so
    /// indexes handed out after a reinitialization never collide with ones
    /// still referenced by outstanding stopped-sets.
    pub(crate) fn reinitialize(&mut self) {
        self.children.clear();
        self.ids.clear();
        self.pids.clear();
        self.groups.clear();
        self.bound_by.clear();
    }

    fn remove(&mut self, index: u64) -> Option<ChildState> {
        let child = self.children.remove(&index)?;
        if let Some(id) = &child.spec.id {
            self.ids.remove(id);
        }
        if let Some(pid) = child.pid {
            self.pids.remove(&pid);
        }
        if let Some(group) = &child.spec.shutdown_group {
            if let Some(members) = self.groups.get_mut(group) {
                members.remove(&index);
                if members.is_empty() {
                    self.groups.remove(group);
                }
            }
        }
        for dep in &child.deps {
            if let Some(dependents) = self.bound_by.get_mut(dep) {
                dependents.remove(&index);
                if dependents.is_empty() {
                    self.bound_by.remove(dep);
                }
            }
        }
        self.bound_by.remove(&index);
        Some(child)
    }
}
