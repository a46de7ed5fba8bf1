//! Worker trait and the child-body adapter

use crate::spec::{ChildSpec, StartOutcome};
use crate::types::ExitReason;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A long-running child implemented as a type rather than a closure.
///
/// Workers built through [`ChildSpec::worker`] are recreated from their
/// factory on every restart.
#[async_trait]
pub trait Worker: Send + 'static {
    /// The type of error this worker can return
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run the worker's main loop.
    ///
    /// The loop should return promptly once `shutdown` is cancelled; a worker
    /// that keeps running past its shutdown budget is killed.
    async fn run(&mut self, shutdown: CancellationToken) -> Result<(), Self::Error>;
}

/// Drives a worker to completion and maps its result to an exit reason
async fn run_worker<W: Worker>(
    mut worker: W,
    shutdown: CancellationToken,
    name: String,
) -> ExitReason {
    slog::debug!(slog_scope::logger(), "worker started"; "worker" => &name);

    match worker.run(shutdown).await {
        Ok(()) => {
            slog::debug!(slog_scope::logger(), "worker completed normally"; "worker" => &name);
            ExitReason::Normal
        }
        Err(err) => {
            slog::warn!(slog_scope::logger(), "worker failed";
                "worker" => &name,
                "error" => %err
            );
            ExitReason::Failure(err.to_string())
        }
    }
}

impl ChildSpec {
    /// Builds a specification from a worker factory.
    ///
    /// The factory is invoked on every start, so restarts get a fresh worker.
    pub fn worker<W, F>(id: impl Into<String>, factory: F) -> ChildSpec
    where
        W: Worker,
        F: Fn() -> W + Send + Sync + 'static,
    {
        let id = id.into();
        let name = id.clone();
        ChildSpec::new(move |token| {
            let worker = factory();
            StartOutcome::Run(Box::pin(run_worker(worker, token, name.clone())))
        })
        .with_id(id)
    }
}
