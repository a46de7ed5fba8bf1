//! Child specifications and normalization

use crate::restart::{RestartIntensity, RestartPolicy};
use crate::types::{ChildRef, ChildType, ExitReason};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Future driving a started child until it exits
pub type ChildBody = Pin<Box<dyn Future<Output = ExitReason> + Send>>;

/// Result of invoking a child's start function
pub enum StartOutcome {
    /// A task body for the parent to spawn and monitor
    Run(ChildBody),
    /// No task was created; the child is still tracked unless the spec
    /// opted out with [`ChildSpec::with_keep_ignored`]
    Ignore,
    /// The start failed with the given reason
    Fail(ExitReason),
}

pub(crate) type StartFn = Arc<dyn Fn(CancellationToken) -> StartOutcome + Send + Sync>;

/// Shutdown budget applied when the parent stops a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shutdown {
    /// Deliver the stop signal and wait up to the budget before killing
    Timeout(Duration),
    /// Deliver the stop signal and wait indefinitely
    Infinity,
    /// Kill immediately, no grace period
    BrutalKill,
}

/// Specification for starting and restarting one child.
///
/// Built with defaults and refined through the `with_*` methods; the parent
/// normalizes the spec when the child is started, filling the type-dependent
/// shutdown budget and rejecting invalid inputs.
#[derive(Clone)]
pub struct ChildSpec {
    pub(crate) id: Option<String>,
    pub(crate) meta: Value,
    pub(crate) start: StartFn,
    pub(crate) restart_policy: RestartPolicy,
    pub(crate) shutdown: Option<Shutdown>,
    pub(crate) child_type: ChildType,
    pub(crate) modules: Vec<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) restart_intensity: RestartIntensity,
    pub(crate) binds_to: Vec<ChildRef>,
    pub(crate) shutdown_group: Option<String>,
    pub(crate) keep_ignored: bool,
}

impl ChildSpec {
    /// Creates a specification from a raw start function.
    ///
    /// The function receives the cancellation token the parent will trip when
    /// it stops the child gracefully.
    pub fn new(start: impl Fn(CancellationToken) -> StartOutcome + Send + Sync + 'static) -> Self {
        Self {
            id: None,
            meta: Value::Null,
            start: Arc::new(start),
            restart_policy: RestartPolicy::default(),
            shutdown: None,
            child_type: ChildType::Worker,
            modules: Vec::new(),
            timeout: None,
            restart_intensity: RestartIntensity::unlimited(Duration::from_secs(5)),
            binds_to: Vec::new(),
            shutdown_group: None,
            keep_ignored: true,
        }
    }

    /// Creates a specification from an async task body.
    ///
    /// Restarts invoke the closure again to produce a fresh body.
    pub fn task<F, Fut>(body: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExitReason> + Send + 'static,
    {
        Self::new(move |token| StartOutcome::Run(Box::pin(body(token))))
    }

    /// Sets the caller-chosen identifier, unique across the parent
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attaches opaque metadata; the parent never inspects it
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    /// Sets the restart policy
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Sets the shutdown budget (default: 5 s for workers, infinity for
    /// supervisors)
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Marks the child a worker or a supervisor
    pub fn with_child_type(mut self, child_type: ChildType) -> Self {
        self.child_type = child_type;
        self
    }

    /// Sets the advisory module list reported by the tree-walk queries
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Kills the child if it is still running after the given budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the per-child restart ceiling (default: unlimited within 5 s)
    pub fn with_restart_intensity(mut self, intensity: RestartIntensity) -> Self {
        self.restart_intensity = intensity;
        self
    }

    /// Binds the child to older siblings whose termination drags it down.
    ///
    /// References must resolve to already-started children of equal or
    /// greater restart strength.
    pub fn with_bindings(mut self, refs: impl IntoIterator<Item = impl Into<ChildRef>>) -> Self {
        self.binds_to = refs.into_iter().map(Into::into).collect();
        self
    }

    /// Puts the child in a shutdown group; members stop together.
    ///
    /// All members of a group must share one restart policy. An ignored
    /// member (no task was created) is popped with its group but has nothing
    /// to stop.
    pub fn with_shutdown_group(mut self, group: impl Into<String>) -> Self {
        self.shutdown_group = Some(group.into());
        self
    }

    /// Whether a child whose start function ignored is kept in the registry
    /// with no pid (default true)
    pub fn with_keep_ignored(mut self, keep: bool) -> Self {
        self.keep_ignored = keep;
        self
    }

    /// Caller-chosen identifier
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Opaque metadata
    pub fn meta(&self) -> &Value {
        &self.meta
    }

    /// Restart policy
    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// Worker or supervisor
    pub fn child_type(&self) -> ChildType {
        self.child_type
    }

    /// Advisory module list
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Timeout budget, if one is set
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Bindings to older siblings
    pub fn binds_to(&self) -> &[ChildRef] {
        &self.binds_to
    }

    /// Shutdown group, if the child belongs to one
    pub fn shutdown_group(&self) -> Option<&str> {
        self.shutdown_group.as_deref()
    }

    /// Shutdown budget; `None` until normalization resolves the
    /// type-dependent default at start
    pub fn shutdown(&self) -> Option<Shutdown> {
        self.shutdown
    }

    /// Fills the type-dependent defaults and validates the spec
    pub(crate) fn normalize(&mut self) -> Result<(), String> {
        if self.shutdown.is_none() {
            self.shutdown = Some(match self.child_type {
                ChildType::Worker => Shutdown::Timeout(Duration::from_millis(5000)),
                ChildType::Supervisor => Shutdown::Infinity,
            });
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err("timeout must be positive".to_string());
        }
        if self.restart_intensity.within == Duration::ZERO {
            return Err("restart window must be positive".to_string());
        }
        Ok(())
    }

    /// Shutdown budget, resolving the type-dependent default when the spec
    /// was not normalized yet
    pub(crate) fn shutdown_budget(&self) -> Shutdown {
        self.shutdown.unwrap_or(match self.child_type {
            ChildType::Worker => Shutdown::Timeout(Duration::from_millis(5000)),
            ChildType::Supervisor => Shutdown::Infinity,
        })
    }
}

impl fmt::Debug for ChildSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildSpec")
            .field("id", &self.id)
            .field("restart_policy", &self.restart_policy)
            .field("shutdown", &self.shutdown)
            .field("child_type", &self.child_type)
            .field("timeout", &self.timeout)
            .field("binds_to", &self.binds_to)
            .field("shutdown_group", &self.shutdown_group)
            .field("keep_ignored", &self.keep_ignored)
            .finish()
    }
}
