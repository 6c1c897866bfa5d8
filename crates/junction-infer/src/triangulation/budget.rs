//! Time and cancellation limits for triangulation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Shared flag a caller can raise to stop a long triangulation early.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a triangulation finished without scoring every elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradeReason {
    /// The wall-clock limit elapsed.
    Timeout,
    /// The caller raised its [`CancellationToken`].
    Cancelled,
}

/// Whether the strategy chose every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimality {
    /// Every node was picked by the strategy.
    Heuristic,
    /// The budget ran out; the remaining nodes were eliminated by id.
    Degraded(DegradeReason),
}

/// Limits checked between eliminations.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl Budget {
    /// No limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Stop once `timeout` has elapsed since triangulation started.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configured wall-clock limit, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Reason to stop, if any, for work that began at `started`.
    pub fn exceeded(&self, started: Instant) -> Option<DegradeReason> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(DegradeReason::Cancelled);
        }
        match self.timeout {
            Some(limit) if started.elapsed() >= limit => Some(DegradeReason::Timeout),
            _ => None,
        }
    }
}
