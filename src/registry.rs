//! Discovery index mirroring the parent's id/pid/meta bookkeeping.
//!
//! The index is the one shared mutable resource of the system: the owner task
//! is its single writer, and arbitrary tasks may read it concurrently without
//! contacting the owner. Readers must tolerate transient staleness; a pid
//! returned by the index may already have died.

use crate::types::ChildPid;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// One registered child as seen by index readers
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Caller-chosen identifier, if the child has one
    pub id: Option<String>,
    /// Opaque metadata snapshot
    pub meta: Value,
}

/// Concurrent `id → pid` / `pid → entry` index over the parent's children.
///
/// Cloning the registry shares the underlying tables; the handle can be
/// passed freely to reader tasks. The store is backed by `DashMap` for
/// lock-free concurrent access.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pids: Arc<DashMap<ChildPid, RegistryEntry>>,
    ids: Arc<DashMap<String, ChildPid>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, pid: ChildPid, id: Option<String>, meta: Value) {
        if let Some(id) = &id {
            self.ids.insert(id.clone(), pid);
        }
        self.pids.insert(pid, RegistryEntry { id, meta });
    }

    pub(crate) fn unregister(&self, pid: ChildPid) {
        if let Some((_, entry)) = self.pids.remove(&pid) {
            if let Some(id) = entry.id {
                // Only drop the id mapping if it still points at this pid;
                // a restarted incarnation may have claimed it already.
                self.ids.remove_if(&id, |_, mapped| *mapped == pid);
            }
        }
    }

    pub(crate) fn update_meta(&self, pid: ChildPid, meta: Value) {
        if let Some(mut entry) = self.pids.get_mut(&pid) {
            entry.meta = meta;
        }
    }

    /// Resolves a caller-chosen id to the pid of its current incarnation
    pub fn child_pid(&self, id: &str) -> Option<ChildPid> {
        self.ids.get(id).map(|entry| *entry.value())
    }

    /// Resolves a pid back to its caller-chosen id
    pub fn child_id(&self, pid: ChildPid) -> Option<String> {
        self.pids.get(&pid).and_then(|entry| entry.value().id.clone())
    }

    /// Metadata snapshot of a registered child
    pub fn child_meta(&self, pid: ChildPid) -> Option<Value> {
        self.pids.get(&pid).map(|entry| entry.value().meta.clone())
    }

    /// Number of registered children
    pub fn len(&self) -> usize {
        self.pids.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Snapshot of all registered children
    pub fn entries(&self) -> Vec<(ChildPid, RegistryEntry)> {
        self.pids
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
