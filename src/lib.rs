//! Parent-style supervision of dynamic child tasks.
//!
//! A single owner task tracks a dynamic set of child tokio tasks, traps their
//! exits as mailbox messages, restarts them under configurable policies and
//! intensity ceilings, propagates lifecycle dependencies between siblings,
//! and tears everything down in reverse startup order when the owner stops.
//!
//! # Features
//!
//! - **Restart Policies**: `Permanent`, `Transient`, `WithDep`, and
//!   `Temporary` restart behaviors per child
//! - **Lifecycle Bindings**: a child can bind to older siblings; their
//!   termination drags it down with them
//! - **Shutdown Groups**: symmetric dependency classes whose members stop
//!   together
//! - **Restart Intensity**: parent-wide and per-child restart ceilings with
//!   sliding time windows, with deferred retries for partial failures
//! - **Deterministic Shutdown**: reverse-startup-order teardown with
//!   per-child shutdown budgets and a hard kill on expiry
//! - **Discovery Index**: an optional concurrent `id → pid → meta` table
//!   readable without contacting the owner
//! - **Structured Logging**: built-in support for `slog` structured logging
//!
//! # Quick Start
//!
//! ```rust
//! use brood::{ChildSpec, ExitReason, Options, Parent, RestartPolicy};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parent = Parent::new(Options::default());
//!
//! // Start a child; the token trips when the parent stops it gracefully.
//! parent.start_child(
//!     ChildSpec::task(|token| async move {
//!         token.cancelled().await;
//!         ExitReason::Normal
//!     })
//!     .with_id("ticker")
//!     .with_restart_policy(RestartPolicy::Permanent),
//! )?;
//!
//! // Dispatch loop: pull mailbox messages and hand them to the core.
//! // (A real owner would run this until told to stop.)
//! if let Some(msg) = tokio::time::timeout(
//!     std::time::Duration::from_millis(10),
//!     parent.recv(),
//! )
//! .await
//! .ok()
//! .flatten()
//! {
//!     let _ = parent.handle_message(msg).await?;
//! }
//!
//! // Deterministic teardown, reverse startup order.
//! parent.shutdown_all(ExitReason::Shutdown).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Bindings and Groups
//!
//! Bindings are backward references: a child may bind only to already-started
//! siblings of equal or greater restart strength
//! (`permanent > transient > with_dep > temporary`). When a child goes down,
//! everything transitively bound to it, and every member of its shutdown
//! group, goes down with it; if the originating child restarts, the whole set
//! is restarted in its original startup order.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

mod parent;
mod registry;
mod restart;
mod spec;
mod types;
mod worker;

// Re-export public API
pub use parent::{Message, MessageOutcome, Options, Parent, ParentError, RestartOpts, StartError};
pub use registry::{Registry, RegistryEntry};
pub use restart::{RestartIntensity, RestartPolicy};
pub use spec::{ChildBody, ChildSpec, Shutdown, StartOutcome};
pub use types::{
    ChildCounts, ChildEntry, ChildInfo, ChildPid, ChildRef, ChildType, ExitReason, StoppedChildren,
};
pub use worker::Worker;
