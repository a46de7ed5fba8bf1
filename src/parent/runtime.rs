//! Parent core - lifecycle engine, restart engine, dispatcher, shutdown

use super::error::{ParentError, StartError};
use super::state::{ChildState, State};
use crate::registry::Registry;
use crate::restart::{RestartIntensity, RestartPolicy, RestartWindow};
use crate::spec::{ChildSpec, Shutdown, StartOutcome};
use crate::types::{
    ChildCounts, ChildEntry, ChildInfo, ChildPid, ChildRef, ChildType, ExitReason, StoppedChild,
    StoppedChildren,
};
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Messages
// ============================================================================

/// Message arriving in the owner's mailbox.
///
/// Child wrapper tasks, timeout timers, and the deferred-restart mechanism
/// all post here; the host's dispatch loop pulls messages with
/// [`Parent::recv`] and routes them through [`Parent::handle_message`].
#[derive(Debug)]
pub enum Message {
    /// Exit signal from a child task
    ChildExit {
        /// Pid of the child that exited
        pid: ChildPid,
        /// Why it exited
        reason: ExitReason,
    },
    /// A child's timeout timer fired
    ChildTimeout {
        /// Pid of the child whose budget ran out
        pid: ChildPid,
    },
    /// Deferred continuation of a partially failed restart
    ResumeRestart(StoppedChildren),
    /// Client query: list children for generic supervisory tools
    WhichChildren {
        /// Where to send the answer
        respond_to: oneshot::Sender<Vec<ChildInfo>>,
    },
    /// Client query: child counts
    CountChildren {
        /// Where to send the answer
        respond_to: oneshot::Sender<ChildCounts>,
    },
    /// Client query: descriptor lookup
    GetChildSpec {
        /// Which child to look up
        child: ChildRef,
        /// Where to send the answer
        respond_to: oneshot::Sender<Option<ChildSpec>>,
    },
}

/// Outcome of dispatching one mailbox message
#[derive(Debug)]
pub enum MessageOutcome {
    /// Not a message for a tracked child; handed back to the host
    Unhandled(Message),
    /// Handled internally, nothing for the host to do
    Ignored,
    /// Children stopped without an automatic restart; the host may keep the
    /// set for a later [`Parent::return_children`]
    StoppedChildren(StoppedChildren),
}

// ============================================================================
// Options
// ============================================================================

/// Parent-wide configuration
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Parent-wide restart ceiling; `None` lifts it
    pub max_restarts: Option<usize>,
    /// Width of the parent-wide restart window
    pub max_seconds: Duration,
    /// Whether to maintain the concurrent discovery index
    pub registry_enabled: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_restarts: Some(3),
            max_seconds: Duration::from_secs(5),
            registry_enabled: false,
        }
    }
}

/// Options for [`Parent::restart_child`] and [`Parent::return_children`]
#[derive(Debug, Clone, Copy)]
pub struct RestartOpts {
    /// Whether temporary children in the stopped set are restarted as well
    /// (default true); the explicit target of a manual restart always is
    pub include_temporary: bool,
}

impl Default for RestartOpts {
    fn default() -> Self {
        Self {
            include_temporary: true,
        }
    }
}

// ============================================================================
// Parent
// ============================================================================

/// The supervision core.
///
/// A `Parent` lives on a single owner task and is threaded through every
/// operation by `&mut self`; children run as independent tokio tasks and
/// communicate with the owner exclusively through exit messages on its
/// mailbox. Constructing the parent is the `initialize` step of the protocol:
/// child deaths materialize as [`Message::ChildExit`] values instead of
/// propagating, and a second initialization of the same owner is ruled out by
/// ownership.
pub struct Parent {
    state: State,
    window: RestartWindow,
    registry: Option<Registry>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    /// Messages set aside by a selective drain, served before the mailbox
    pending: VecDeque<Message>,
    next_pid: u64,
}

impl Parent {
    /// Creates the core with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `max_seconds` is zero.
    pub fn new(opts: Options) -> Self {
        assert!(
            opts.max_seconds > Duration::ZERO,
            "max_seconds must be positive"
        );
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: State::default(),
            window: RestartWindow::new(RestartIntensity {
                max_restarts: opts.max_restarts,
                within: opts.max_seconds,
            }),
            registry: opts.registry_enabled.then(Registry::new),
            tx,
            rx,
            pending: VecDeque::new(),
            next_pid: 0,
        }
    }

    /// A cloneable sender into the owner's mailbox, for the external client
    /// adapter that funnels queries into the dispatcher
    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }

    /// Handle to the concurrent discovery index, when enabled
    pub fn registry(&self) -> Option<Registry> {
        self.registry.clone()
    }

    /// Yields the next mailbox message, serving messages set aside by a
    /// selective drain first
    pub async fn recv(&mut self) -> Option<Message> {
        if let Some(msg) = self.pending.pop_front() {
            return Some(msg);
        }
        self.rx.recv().await
    }

    // ========================================================================
    // Lifecycle engine - start
    // ========================================================================

    /// Starts a child under this parent.
    ///
    /// Returns `Ok(Some(pid))` for a started child, `Ok(None)` when the start
    /// function ignored. Validation failures leave the state unchanged.
    pub fn start_child(&mut self, spec: ChildSpec) -> Result<Option<ChildPid>, StartError> {
        let mut spec = spec;
        spec.normalize().map_err(StartError::InvalidChildSpec)?;

        if let Some(id) = &spec.id {
            if let Some(existing) = self.state.child(&ChildRef::Id(id.clone())) {
                return Err(StartError::AlreadyStarted(existing.pid));
            }
        }

        let mut resolved = Vec::with_capacity(spec.binds_to.len());
        let mut missing = Vec::new();
        for r in &spec.binds_to {
            match self.state.resolve(r) {
                Some(index) => resolved.push((r.clone(), index)),
                None => missing.push(r.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(StartError::MissingDeps(missing));
        }

        let mut forbidden = Vec::new();
        for (r, index) in &resolved {
            if let Some(target) = self.state.get(*index) {
                if !spec.restart_policy.can_bind_to(target.spec.restart_policy) {
                    forbidden.push(r.clone());
                }
            }
        }
        if !forbidden.is_empty() {
            return Err(StartError::ForbiddenBindings {
                from: spec.id.clone(),
                to: forbidden,
            });
        }

        if let Some(group) = &spec.shutdown_group {
            let uniform = self
                .state
                .group_members(group)
                .iter()
                .all(|member| member.spec.restart_policy == spec.restart_policy);
            if !uniform {
                return Err(StartError::NonUniformShutdownGroup(group.clone()));
            }
        }

        let deps: BTreeSet<u64> = resolved.into_iter().map(|(_, index)| index).collect();
        let window = RestartWindow::new(spec.restart_intensity);
        let index = self.state.allocate_index();
        self.start_resolved(spec, deps, index, window)
    }

    /// Starts a batch of children atomically: on the first failure the
    /// already-started prefix is shut down, and the owner is expected to
    /// exit with the returned error.
    pub async fn start_all_children(
        &mut self,
        specs: Vec<ChildSpec>,
    ) -> Result<Vec<Option<ChildPid>>, StartError> {
        let mut started = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.start_child(spec) {
                Ok(pid) => started.push(pid),
                Err(err) => {
                    slog::error!(slog_scope::logger(), "batch start failed, stopping started prefix";
                        "error" => %err
                    );
                    self.shutdown_all(ExitReason::Shutdown).await;
                    return Err(err);
                }
            }
        }
        Ok(started)
    }

    /// Invokes the start function and records the outcome. The caller has
    /// already validated the spec and resolved its bindings; on restarts the
    /// original startup index and restart window are carried over.
    fn start_resolved(
        &mut self,
        spec: ChildSpec,
        deps: BTreeSet<u64>,
        index: u64,
        window: RestartWindow,
    ) -> Result<Option<ChildPid>, StartError> {
        let token = CancellationToken::new();
        match (spec.start)(token.clone()) {
            StartOutcome::Run(body) => {
                let pid = self.allocate_pid();
                let tx = self.tx.clone();
                let join = tokio::spawn(async move {
                    let reason = body.await;
                    let _ = tx.send(Message::ChildExit { pid, reason });
                });
                let timer = spec.timeout.map(|after| self.arm_timer(pid, after));

                slog::debug!(slog_scope::logger(), "child started";
                    "id" => ?spec.id,
                    "pid" => %pid
                );
                if let Some(registry) = &self.registry {
                    registry.register(pid, spec.id.clone(), spec.meta.clone());
                }

                self.state.register(ChildState {
                    spec,
                    pid: Some(pid),
                    startup_index: index,
                    deps,
                    join: Some(join),
                    cancel: Some(token),
                    timer,
                    window,
                });
                Ok(Some(pid))
            }
            StartOutcome::Ignore => {
                if spec.keep_ignored {
                    self.state.register(ChildState {
                        spec,
                        pid: None,
                        startup_index: index,
                        deps,
                        join: None,
                        cancel: None,
                        timer: None,
                        window,
                    });
                }
                Ok(None)
            }
            StartOutcome::Fail(reason) => Err(StartError::Failed(reason)),
        }
    }

    fn allocate_pid(&mut self) -> ChildPid {
        self.next_pid += 1;
        ChildPid(self.next_pid)
    }

    /// Arms the timeout timer; at expiry it posts a timeout message to the
    /// owner's mailbox.
    fn arm_timer(&self, pid: ChildPid, after: Duration) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Message::ChildTimeout { pid });
        })
    }

    // ========================================================================
    // Dispatcher
    // ========================================================================

    /// Classifies and handles one mailbox message.
    ///
    /// Exit signals from untracked pids come back as
    /// [`MessageOutcome::Unhandled`]; everything the core consumed reports
    /// [`MessageOutcome::Ignored`]; a down event that did not lead to an
    /// automatic restart surfaces the stopped set. The error path is the
    /// restart ceiling: by the time it is returned, all surviving children
    /// have been stopped and the owner is expected to exit.
    pub async fn handle_message(&mut self, msg: Message) -> Result<MessageOutcome, ParentError> {
        match msg {
            Message::ChildExit { pid, reason } => self.handle_child_exit(pid, reason).await,
            Message::ChildTimeout { pid } => self.handle_child_timeout(pid).await,
            Message::ResumeRestart(stopped) => {
                self.restart_stopped(stopped, RestartOpts::default())
                    .await?;
                Ok(MessageOutcome::Ignored)
            }
            Message::WhichChildren { respond_to } => {
                let _ = respond_to.send(self.which_children());
                Ok(MessageOutcome::Ignored)
            }
            Message::CountChildren { respond_to } => {
                let _ = respond_to.send(self.count_children());
                Ok(MessageOutcome::Ignored)
            }
            Message::GetChildSpec { child, respond_to } => {
                let _ = respond_to.send(self.get_childspec(&child));
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    async fn handle_child_exit(
        &mut self,
        pid: ChildPid,
        reason: ExitReason,
    ) -> Result<MessageOutcome, ParentError> {
        let Some(index) = self.state.resolve(&ChildRef::Pid(pid)) else {
            return Ok(MessageOutcome::Unhandled(Message::ChildExit { pid, reason }));
        };

        // The child is already down; reap its handles before processing.
        let timer = self
            .state
            .get_mut(index)
            .and_then(|child| {
                child.join = None;
                child.cancel = None;
                child.timer.take()
            });
        if let Some(timer) = timer {
            timer.abort();
            let _ = timer.await;
            self.drain_timeout(pid);
        }

        self.child_down(pid, reason).await
    }

    async fn handle_child_timeout(&mut self, pid: ChildPid) -> Result<MessageOutcome, ParentError> {
        let Some(index) = self.state.resolve(&ChildRef::Pid(pid)) else {
            // Stale timer for a child that is already gone
            return Ok(MessageOutcome::Ignored);
        };

        slog::warn!(slog_scope::logger(), "child exceeded its timeout, killing";
            "pid" => %pid
        );

        // Kill unconditionally, no grace period, then process the down event.
        let (join, timer) = match self.state.get_mut(index) {
            Some(child) => {
                child.cancel = None;
                (child.join.take(), child.timer.take())
            }
            None => (None, None),
        };
        if let Some(timer) = timer {
            timer.abort();
            let _ = timer.await;
        }
        if let Some(join) = join {
            join.abort();
            if join.await.is_ok() {
                // The wrapper finished before the abort landed, so its exit
                // message is in the mailbox; consume it.
                self.drain_exit(pid);
            }
        }

        self.child_down(pid, ExitReason::Timeout).await
    }

    /// Common down path: pops the child with everything bound to it, stops
    /// the bound siblings, and either hands the set to the restart engine or
    /// surfaces it.
    async fn child_down(
        &mut self,
        pid: ChildPid,
        reason: ExitReason,
    ) -> Result<MessageOutcome, ParentError> {
        if let Some(registry) = &self.registry {
            registry.unregister(pid);
        }

        let mut popped = self.state.pop_with_bound_siblings(&ChildRef::Pid(pid));

        for i in (0..popped.len()).rev() {
            if popped[i].pid == Some(pid) {
                continue;
            }
            self.stop_child_state(&mut popped[i], &ExitReason::Shutdown)
                .await;
        }

        let auto_restart = popped
            .iter()
            .find(|child| child.pid == Some(pid))
            .map(|child| match child.spec.restart_policy {
                RestartPolicy::Permanent => true,
                RestartPolicy::Transient => reason != ExitReason::Normal,
                RestartPolicy::WithDep | RestartPolicy::Temporary => false,
            })
            .unwrap_or(false);

        slog::debug!(slog_scope::logger(), "child down";
            "pid" => %pid,
            "reason" => %reason,
            "bound" => popped.len().saturating_sub(1),
            "restarting" => auto_restart
        );

        let stopped = snapshot_stopped(popped, |child| {
            if child.pid == Some(pid) {
                reason.clone()
            } else {
                ExitReason::Shutdown
            }
        });

        if auto_restart {
            self.restart_stopped(stopped, RestartOpts::default())
                .await?;
            Ok(MessageOutcome::Ignored)
        } else {
            Ok(MessageOutcome::StoppedChildren(stopped))
        }
    }

    // ========================================================================
    // Lifecycle engine - manual operations
    // ========================================================================

    /// Stops a child together with everything bound to it, then restarts the
    /// set under the original startup order.
    ///
    /// The target restarts even if temporary; temporary siblings are included
    /// according to `opts`. The returned set is non-empty when some children
    /// failed to restart; a deferred retry for them is already queued.
    pub async fn restart_child(
        &mut self,
        child: &ChildRef,
        opts: RestartOpts,
    ) -> Result<StoppedChildren, ParentError> {
        let Some(target) = self.state.resolve(child) else {
            return Err(ParentError::UnknownChild(child.clone()));
        };

        let mut popped = self.state.pop_with_bound_siblings(child);
        for i in (0..popped.len()).rev() {
            self.stop_child_state(&mut popped[i], &ExitReason::Shutdown)
                .await;
        }

        let mut stopped = snapshot_stopped(popped, |_| ExitReason::Shutdown);
        for entry in &mut stopped.entries {
            if entry.startup_index == target {
                entry.force_restart = true;
            }
        }

        self.restart_stopped(stopped, opts).await
    }

    /// Stops a child together with everything bound to it and discards the
    /// descriptors. Bound permanent or transient siblings are not preserved.
    pub async fn shutdown_child(&mut self, child: &ChildRef) -> Result<StoppedChildren, ParentError> {
        if !self.state.contains(child) {
            return Err(ParentError::UnknownChild(child.clone()));
        }

        let mut popped = self.state.pop_with_bound_siblings(child);
        for i in (0..popped.len()).rev() {
            self.stop_child_state(&mut popped[i], &ExitReason::Shutdown)
                .await;
        }

        Ok(snapshot_stopped(popped, |_| ExitReason::Shutdown))
    }

    /// Hands a previously returned stopped set back to the restart engine.
    ///
    /// Children already back in the parent are skipped; the rest are started
    /// in their original startup order, keeping their startup indexes.
    pub async fn return_children(
        &mut self,
        stopped: StoppedChildren,
        opts: RestartOpts,
    ) -> Result<StoppedChildren, ParentError> {
        self.restart_stopped(stopped, opts).await
    }

    /// Applies `f` to a child's metadata and propagates the new value to the
    /// discovery index
    pub fn update_child_meta(
        &mut self,
        child: &ChildRef,
        f: impl FnOnce(Value) -> Value,
    ) -> Result<Value, ParentError> {
        let (meta, pid) = self
            .state
            .update_meta(child, f)
            .ok_or_else(|| ParentError::UnknownChild(child.clone()))?;
        if let (Some(registry), Some(pid)) = (&self.registry, pid) {
            registry.update_meta(pid, meta.clone());
        }
        Ok(meta)
    }

    // ========================================================================
    // Shutdown coordinator
    // ========================================================================

    /// Stops all children in reverse startup order and reinitializes the
    /// state, preserving the configuration.
    ///
    /// Safe to call on the owner's termination path: it is idempotent, and
    /// when it returns, no exit signal of a previously tracked child remains
    /// observable in the mailbox. A `Normal` reason is mapped to `Shutdown`
    /// so a normal-exit reason never leaks out as a child termination reason.
    pub async fn shutdown_all(&mut self, reason: ExitReason) -> StoppedChildren {
        let reason = match reason {
            ExitReason::Normal => ExitReason::Shutdown,
            other => other,
        };

        let mut popped = self.state.pop_all();
        for i in (0..popped.len()).rev() {
            self.stop_child_state(&mut popped[i], &reason).await;
        }
        self.state.reinitialize();

        slog::debug!(slog_scope::logger(), "all children stopped";
            "count" => popped.len(),
            "reason" => %reason
        );

        snapshot_stopped(popped, |_| reason.clone())
    }

    // ========================================================================
    // Synchronous stop protocol
    // ========================================================================

    /// Stops one already-popped child: cancel and drain its timer, deliver
    /// the stop signal, wait within the shutdown budget, kill on expiry, and
    /// drain the resulting exit message.
    ///
    /// The down reason observed by the monitor is not compared with the sent
    /// signal; control flow never depends on it.
    async fn stop_child_state(&mut self, child: &mut ChildState, reason: &ExitReason) {
        if let Some(timer) = child.timer.take() {
            timer.abort();
            let _ = timer.await;
            if let Some(pid) = child.pid {
                self.drain_timeout(pid);
            }
        }

        let Some(pid) = child.pid else {
            // Ignored child: tracked, but there is nothing to stop.
            return;
        };
        let Some(mut join) = child.join.take() else {
            return;
        };

        let completed = match child.spec.shutdown_budget() {
            Shutdown::BrutalKill => {
                join.abort();
                join.await.is_ok()
            }
            Shutdown::Infinity => {
                if let Some(cancel) = child.cancel.take() {
                    cancel.cancel();
                }
                join.await.is_ok()
            }
            Shutdown::Timeout(budget) => {
                if let Some(cancel) = child.cancel.take() {
                    cancel.cancel();
                }
                match tokio::time::timeout(budget, &mut join).await {
                    Ok(result) => result.is_ok(),
                    Err(_) => {
                        slog::warn!(slog_scope::logger(), "child did not stop within budget, killing";
                            "pid" => %pid,
                            "budget" => ?budget
                        );
                        join.abort();
                        join.await.is_ok()
                    }
                }
            }
        };

        if completed {
            // The wrapper ran to completion, so its exit message is queued;
            // consume it so it is never surfaced.
            self.drain_exit(pid);
        }

        if let Some(registry) = &self.registry {
            registry.unregister(pid);
        }

        slog::debug!(slog_scope::logger(), "child stopped";
            "id" => ?child.spec.id,
            "pid" => %pid,
            "reason" => %reason
        );
    }

    /// Removes the first queued exit message of `pid`, keeping the relative
    /// order of everything else. Absence is acceptable.
    fn drain_exit(&mut self, pid: ChildPid) {
        let matches =
            |msg: &Message| matches!(msg, Message::ChildExit { pid: p, .. } if *p == pid);
        if let Some(pos) = self.pending.iter().position(matches) {
            self.pending.remove(pos);
            return;
        }
        while let Ok(msg) = self.rx.try_recv() {
            if matches(&msg) {
                return;
            }
            self.pending.push_back(msg);
        }
    }

    /// Removes a queued timeout message of `pid`, if the timer fired before
    /// it was cancelled
    fn drain_timeout(&mut self, pid: ChildPid) {
        let matches =
            |msg: &Message| matches!(msg, Message::ChildTimeout { pid: p } if *p == pid);
        if let Some(pos) = self.pending.iter().position(matches) {
            self.pending.remove(pos);
            return;
        }
        while let Ok(msg) = self.rx.try_recv() {
            if matches(&msg) {
                return;
            }
            self.pending.push_back(msg);
        }
    }

    // ========================================================================
    // Restart engine
    // ========================================================================

    /// Charges one restart event, filters and orders the stopped set, and
    /// attempts to start each child under its original startup index.
    ///
    /// A start failure abandons the remainder, rolls back restarted children
    /// bound to still-stopped siblings, and defers a retry through the
    /// owner's own mailbox; the retry charges another restart event, so a
    /// child that can never start eventually trips the ceiling.
    async fn restart_stopped(
        &mut self,
        stopped: StoppedChildren,
        opts: RestartOpts,
    ) -> Result<StoppedChildren, ParentError> {
        let mut entries = stopped.entries;

        // One event per call against the parent window, no matter how many
        // children, and one against each stopped child's own counter.
        if self.window.record_restart() {
            slog::error!(slog_scope::logger(), "parent restart intensity exceeded, giving up");
            return Err(self.give_up(ExitReason::ReachedMaxRestartIntensity).await);
        }
        for entry in &mut entries {
            if entry.window.record_restart() {
                slog::error!(slog_scope::logger(), "child restart intensity exceeded, giving up";
                    "id" => ?entry.spec.id
                );
                return Err(self.give_up(ExitReason::Shutdown).await);
            }
        }

        entries.retain(|entry| {
            entry.spec.restart_policy != RestartPolicy::Temporary
                || entry.force_restart
                || opts.include_temporary
        });
        entries.sort_by_key(|entry| entry.startup_index);

        let mut failed: Option<(usize, StartError)> = None;
        for (i, entry) in entries.iter().enumerate() {
            if self.state.has_index(entry.startup_index) {
                // Already back, e.g. returned twice or raced with a deferred
                // retry; nothing to do for this child.
                continue;
            }
            let result = self.start_resolved(
                entry.spec.clone(),
                entry.deps.clone(),
                entry.startup_index,
                entry.window.clone(),
            );
            if let Err(err) = result {
                failed = Some((i, err));
                break;
            }
        }

        let Some((failed_at, err)) = failed else {
            return Ok(StoppedChildren {
                entries: Vec::new(),
            });
        };

        slog::warn!(slog_scope::logger(), "child restart failed, deferring retry";
            "error" => %err
        );

        // Abandon the remainder and roll back restarted children that are
        // bound to a still-stopped sibling.
        let mut remainder = entries.split_off(failed_at);
        let stopped_indexes: BTreeSet<u64> =
            remainder.iter().map(|entry| entry.startup_index).collect();
        let mut rolled_back = self.state.pop_bound_to(&stopped_indexes);
        for i in (0..rolled_back.len()).rev() {
            self.stop_child_state(&mut rolled_back[i], &ExitReason::Shutdown)
                .await;
        }
        remainder.extend(snapshot_stopped(rolled_back, |_| ExitReason::Shutdown).entries);
        remainder.sort_by_key(|entry| entry.startup_index);

        let remainder = StoppedChildren { entries: remainder };
        let report = remainder.clone();
        let _ = self.tx.send(Message::ResumeRestart(remainder));
        Ok(report)
    }

    /// The parent gives up: every surviving child is stopped and the caller
    /// propagates the escalation reason to the owner.
    async fn give_up(&mut self, reason: ExitReason) -> ParentError {
        self.shutdown_all(ExitReason::Shutdown).await;
        ParentError::RestartLimitExceeded { reason }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All tracked children in startup order
    pub fn children(&self) -> Vec<ChildEntry> {
        self.state
            .children()
            .map(|child| ChildEntry {
                id: child.spec.id.clone(),
                pid: child.pid,
                meta: child.spec.meta.clone(),
            })
            .collect()
    }

    /// Id of the child running as `pid`
    pub fn child_id(&self, pid: ChildPid) -> Option<String> {
        self.state
            .child(&ChildRef::Pid(pid))
            .and_then(|child| child.spec.id.clone())
    }

    /// Pid of the child registered under `id`; `None` also for an ignored
    /// child, which has no task
    pub fn child_pid(&self, id: &str) -> Option<ChildPid> {
        self.state
            .child(&ChildRef::Id(id.to_string()))
            .and_then(|child| child.pid)
    }

    /// Metadata of a tracked child
    pub fn child_meta(&self, child: &ChildRef) -> Option<Value> {
        self.state.child(child).map(|c| c.spec.meta.clone())
    }

    /// True when the reference resolves to a tracked child
    pub fn is_child(&self, child: &ChildRef) -> bool {
        self.state.contains(child)
    }

    /// Number of tracked children, ignored ones included
    pub fn num_children(&self) -> usize {
        self.state.len()
    }

    /// Children shaped for generic supervisory tools, in startup order
    pub fn which_children(&self) -> Vec<ChildInfo> {
        self.state
            .children()
            .map(|child| ChildInfo {
                id: child.spec.id.clone(),
                pid: child.pid,
                child_type: child.spec.child_type,
                modules: child.spec.modules.clone(),
            })
            .collect()
    }

    /// Child counts for generic supervisory tools
    pub fn count_children(&self) -> ChildCounts {
        let mut counts = ChildCounts::default();
        for child in self.state.children() {
            counts.specs += 1;
            if child.pid.is_some() {
                counts.active += 1;
            }
            match child.spec.child_type {
                ChildType::Supervisor => counts.supervisors += 1,
                ChildType::Worker => counts.workers += 1,
            }
        }
        counts
    }

    /// Descriptor of a tracked child
    pub fn get_childspec(&self, child: &ChildRef) -> Option<ChildSpec> {
        self.state.child(child).map(|c| c.spec.clone())
    }
}

/// Turns popped children into the stopped-set snapshot, assigning each its
/// exit reason; input and output are in ascending startup order.
fn snapshot_stopped(
    children: Vec<ChildState>,
    mut reason_for: impl FnMut(&ChildState) -> ExitReason,
) -> StoppedChildren {
    let entries = children
        .into_iter()
        .map(|child| {
            let exit_reason = reason_for(&child);
            StoppedChild {
                exit_reason,
                startup_index: child.startup_index,
                deps: child.deps,
                pid: child.pid,
                force_restart: false,
                window: child.window,
                spec: child.spec,
            }
        })
        .collect();
    StoppedChildren { entries }
}
