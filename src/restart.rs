//! Restart policies and intensity accounting

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// When a child's own termination triggers an automatic restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Always restart when the child terminates (`permanent`)
    Permanent,
    /// Restart only on abnormal termination (`transient`)
    Transient,
    /// Never restart on its own exit, but come back when dragged down and
    /// restarted through a binding (`with_dep`)
    WithDep,
    /// Never restart (`temporary`)
    Temporary,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::Permanent
    }
}

impl RestartPolicy {
    /// Binding strength, ordered `permanent > transient > with_dep > temporary`.
    ///
    /// A child may bind only to children of equal or greater strength; a
    /// permanent child bound to a temporary one could otherwise outlive its
    /// dependency silently.
    pub(crate) fn strength(self) -> u8 {
        match self {
            RestartPolicy::Permanent => 3,
            RestartPolicy::Transient => 2,
            RestartPolicy::WithDep => 1,
            RestartPolicy::Temporary => 0,
        }
    }

    pub(crate) fn can_bind_to(self, target: RestartPolicy) -> bool {
        target.strength() >= self.strength()
    }
}

/// Restart ceiling: maximum restart events within a sliding time window
#[derive(Debug, Clone, Copy)]
pub struct RestartIntensity {
    /// Maximum number of restarts allowed within the window; `None` lifts
    /// the ceiling
    pub max_restarts: Option<usize>,
    /// Width of the sliding window
    pub within: Duration,
}

impl RestartIntensity {
    /// Creates a bounded restart ceiling
    pub fn new(max_restarts: usize, within: Duration) -> Self {
        Self {
            max_restarts: Some(max_restarts),
            within,
        }
    }

    /// Creates an unlimited ceiling that still tracks the window
    pub fn unlimited(within: Duration) -> Self {
        Self {
            max_restarts: None,
            within,
        }
    }
}

impl Default for RestartIntensity {
    fn default() -> Self {
        Self {
            max_restarts: Some(3),
            within: Duration::from_secs(5),
        }
    }
}

/// Sliding window of recent restart timestamps used for intensity checks
#[derive(Debug, Clone)]
pub(crate) struct RestartWindow {
    intensity: RestartIntensity,
    restart_times: VecDeque<Instant>,
}

impl RestartWindow {
    pub(crate) fn new(intensity: RestartIntensity) -> Self {
        Self {
            intensity,
            restart_times: VecDeque::new(),
        }
    }

    /// Records a restart event and returns true if the ceiling is exceeded
    pub(crate) fn record_restart(&mut self) -> bool {
        let now = Instant::now();
        let cutoff = now - self.intensity.within;

        // Drop restarts that slid out of the window
        while let Some(&time) = self.restart_times.front() {
            if time < cutoff {
                self.restart_times.pop_front();
            } else {
                break;
            }
        }

        self.restart_times.push_back(now);

        match self.intensity.max_restarts {
            Some(max) => self.restart_times.len() > max,
            None => false,
        }
    }
}
