//! Server-wide shutdown signal and task draining.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of [`ShutdownCoordinator::drain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every task finished. `failed` counts tasks that panicked or were
    /// aborted.
    Completed {
        /// Tasks that did not exit cleanly.
        failed: usize,
    },
    /// The grace period ran out first.
    TimedOut,
}

/// Shared stop signal for the listener and open streams.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown. Returns `true` for the call that actually triggered it.
    pub fn begin(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown and wait up to `grace` for `handles` to finish.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>, grace: Duration) -> DrainOutcome {
        let _ = self.begin();
        info!(tasks = handles.len(), grace_ms = grace.as_millis(), "draining server tasks");

        match tokio::time::timeout(grace, futures::future::join_all(handles)).await {
            Ok(results) => {
                let failed = results.iter().filter(|r| r.is_err()).count();
                if failed > 0 {
                    warn!(failed, "server tasks exited abnormally");
                }
                DrainOutcome::Completed { failed }
            }
            Err(_) => {
                warn!(?grace, "drain timed out with tasks still running");
                DrainOutcome::TimedOut
            }
        }
    }
}
