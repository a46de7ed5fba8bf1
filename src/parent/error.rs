//! Parent core errors

use crate::types::{ChildPid, ChildRef, ExitReason};
use std::fmt;

/// Errors surfaced by [`Parent::start_child`](crate::Parent::start_child).
///
/// Every variant leaves the parent state unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    /// The specification failed validation
    InvalidChildSpec(String),
    /// A child with this id already exists; the pid is `None` when the
    /// existing child is ignored
    AlreadyStarted(Option<ChildPid>),
    /// Some `binds_to` references do not resolve to tracked children
    MissingDeps(Vec<ChildRef>),
    /// The child would bind to dependencies of weaker restart strength
    ForbiddenBindings {
        /// Id of the child being started, if it has one
        from: Option<String>,
        /// The offending references
        to: Vec<ChildRef>,
    },
    /// Existing members of the shutdown group have a different restart policy
    NonUniformShutdownGroup(String),
    /// The start function itself reported a failure
    Failed(ExitReason),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::InvalidChildSpec(reason) => {
                write!(f, "invalid child spec: {}", reason)
            }
            StartError::AlreadyStarted(Some(pid)) => {
                write!(f, "child already started as {}", pid)
            }
            StartError::AlreadyStarted(None) => {
                write!(f, "child already registered as ignored")
            }
            StartError::MissingDeps(refs) => {
                write!(f, "bindings do not resolve: ")?;
                fmt_refs(f, refs)
            }
            StartError::ForbiddenBindings { from, to } => {
                match from {
                    Some(id) => write!(f, "child {:?} binds to weaker children: ", id)?,
                    None => write!(f, "child binds to weaker children: ")?,
                }
                fmt_refs(f, to)
            }
            StartError::NonUniformShutdownGroup(group) => {
                write!(f, "shutdown group {:?} mixes restart policies", group)
            }
            StartError::Failed(reason) => {
                write!(f, "start function failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for StartError {}

fn fmt_refs(f: &mut fmt::Formatter<'_>, refs: &[ChildRef]) -> fmt::Result {
    for (i, r) in refs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", r)?;
    }
    Ok(())
}

/// Errors surfaced by the manual lifecycle operations and the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParentError {
    /// The reference does not resolve to a tracked child
    #[error("unknown child {0}")]
    UnknownChild(ChildRef),
    /// The restart ceiling was hit.
    ///
    /// By the time this is returned all surviving children have been stopped
    /// in reverse startup order; the owner is expected to exit with the
    /// carried reason.
    #[error("restart intensity exceeded, parent exiting with {reason}")]
    RestartLimitExceeded {
        /// Escalation reason: `Shutdown` for a per-child overflow,
        /// `ReachedMaxRestartIntensity` for the parent-wide one
        reason: ExitReason,
    },
}
