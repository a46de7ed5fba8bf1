//! Common types used throughout the parent core

use crate::restart::RestartWindow;
use crate::spec::ChildSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Runtime handle of a started child task.
///
/// Allocated by the parent and never reused for the lifetime of the owner, so
/// a pid seen in a stale message can always be told apart from a restarted
/// incarnation of the same child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChildPid(pub(crate) u64);

impl fmt::Display for ChildPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "child#{}", self.0)
    }
}

/// Reference to a tracked child, either by its caller-chosen id or by its
/// runtime pid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildRef {
    /// Caller-chosen identifier
    Id(String),
    /// Runtime handle
    Pid(ChildPid),
}

impl fmt::Display for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildRef::Id(id) => write!(f, "{:?}", id),
            ChildRef::Pid(pid) => write!(f, "{}", pid),
        }
    }
}

impl From<&str> for ChildRef {
    fn from(id: &str) -> Self {
        ChildRef::Id(id.to_string())
    }
}

impl From<String> for ChildRef {
    fn from(id: String) -> Self {
        ChildRef::Id(id)
    }
}

impl From<ChildPid> for ChildRef {
    fn from(pid: ChildPid) -> Self {
        ChildRef::Pid(pid)
    }
}

/// Why a child, or the parent itself, terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Normal completion
    Normal,
    /// Stopped by the parent
    Shutdown,
    /// Killed after exceeding its timeout budget
    Timeout,
    /// The parent gave up after too many restarts in its window
    ReachedMaxRestartIntensity,
    /// Abnormal termination with a caller-visible reason
    Failure(String),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Shutdown => write!(f, "shutdown"),
            ExitReason::Timeout => write!(f, "timeout"),
            ExitReason::ReachedMaxRestartIntensity => write!(f, "reached_max_restart_intensity"),
            ExitReason::Failure(reason) => write!(f, "failure: {}", reason),
        }
    }
}

/// Type of child in the supervision tree.
///
/// Advisory only; it drives nothing but the generic tree-walk queries and the
/// default shutdown budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildType {
    /// A worker task
    Worker,
    /// A nested supervisor
    Supervisor,
}

/// One row of [`Parent::children`](crate::Parent::children), in startup order
#[derive(Debug, Clone)]
pub struct ChildEntry {
    /// Caller-chosen identifier, if the child has one
    pub id: Option<String>,
    /// Runtime pid; `None` for an ignored child
    pub pid: Option<ChildPid>,
    /// Opaque caller-supplied metadata
    pub meta: Value,
}

/// One row of [`Parent::which_children`](crate::Parent::which_children),
/// shaped for generic supervisory tools
#[derive(Debug, Clone)]
pub struct ChildInfo {
    /// Caller-chosen identifier, if the child has one
    pub id: Option<String>,
    /// Runtime pid; `None` for an ignored child
    pub pid: Option<ChildPid>,
    /// Worker or supervisor
    pub child_type: ChildType,
    /// Advisory module list
    pub modules: Vec<String>,
}

/// Aggregate of [`Parent::count_children`](crate::Parent::count_children)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildCounts {
    /// Number of registered child specifications
    pub specs: usize,
    /// Number of children with a live task
    pub active: usize,
    /// Number of supervisor children
    pub supervisors: usize,
    /// Number of worker children
    pub workers: usize,
}

/// Snapshot of children removed from the parent by a lifecycle event, in
/// ascending startup order.
///
/// This is the currency of the manual return operations: a set obtained from
/// [`Parent::shutdown_all`](crate::Parent::shutdown_all) or a non-restarting
/// down event can be handed back through
/// [`Parent::return_children`](crate::Parent::return_children), which
/// re-registers the children under their original startup order. Returning a
/// set whose children are already back in the parent is a no-op for those
/// children.
#[derive(Debug, Clone)]
pub struct StoppedChildren {
    pub(crate) entries: Vec<StoppedChild>,
}

impl StoppedChildren {
    /// True when no children were left stopped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stopped children in the set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// References of the stopped children, ascending startup order.
    ///
    /// Children with an id are keyed by it; anonymous children by the pid
    /// they had when they stopped.
    pub fn ids(&self) -> Vec<ChildRef> {
        self.entries.iter().filter_map(StoppedChild::key).collect()
    }

    /// Exit reason recorded for one stopped child
    pub fn exit_reason(&self, child: &ChildRef) -> Option<&ExitReason> {
        self.entries
            .iter()
            .find(|e| e.key().as_ref() == Some(child))
            .map(|e| &e.exit_reason)
    }
}

/// Descriptor snapshot carried inside a [`StoppedChildren`] set
#[derive(Debug, Clone)]
pub(crate) struct StoppedChild {
    pub(crate) spec: ChildSpec,
    pub(crate) startup_index: u64,
    pub(crate) deps: BTreeSet<u64>,
    pub(crate) pid: Option<ChildPid>,
    pub(crate) exit_reason: ExitReason,
    pub(crate) force_restart: bool,
    pub(crate) window: RestartWindow,
}

impl StoppedChild {
    fn key(&self) -> Option<ChildRef> {
        match (&self.spec.id, self.pid) {
            (Some(id), _) => Some(ChildRef::Id(id.clone())),
            (None, Some(pid)) => Some(ChildRef::Pid(pid)),
            (None, None) => None,
        }
    }
}
