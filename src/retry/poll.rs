//! Bounded polling of external job status.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::{duration_ms, retry, RetryPolicy};
use crate::error::{PipelineError, Result};
use crate::models::JobSnapshot;

/// Receiver side of the process-wide shutdown flag.
pub type ShutdownSignal = watch::Receiver<bool>;

/// How often to poll and how long to keep polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    /// Hard ceiling on total wall-clock time spent polling.
    #[serde(with = "duration_ms")]
    pub ceiling: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }
}

/// Poll until the job reports a terminal status.
///
/// Each fetch goes through the retry policy. A fetch still in flight when
/// the ceiling is reached is abandoned, and no poll is scheduled past the
/// ceiling, so `TimedOut` is reported at or before `policy.ceiling`.
pub async fn poll_until_terminal<F, Fut>(
    operation: &str,
    policy: &PollPolicy,
    retry_policy: &RetryPolicy,
    mut shutdown: Option<ShutdownSignal>,
    mut fetch: F,
) -> Result<JobSnapshot>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobSnapshot>>,
{
    let start = Instant::now();
    let deadline = start + policy.ceiling;

    loop {
        if is_shutting_down(&shutdown) {
            return Err(PipelineError::Cancelled(operation.to_string()));
        }

        let snapshot = match tokio::time::timeout_at(
            deadline,
            retry(retry_policy, operation, &mut fetch),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(PipelineError::TimedOut {
                    operation: operation.to_string(),
                    elapsed: start.elapsed(),
                })
            }
        };

        debug!("{}: status {}", operation, snapshot.status);
        if snapshot.status.is_terminal() {
            return Ok(snapshot);
        }

        if Instant::now() + policy.interval >= deadline {
            return Err(PipelineError::TimedOut {
                operation: operation.to_string(),
                elapsed: start.elapsed(),
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = shutdown_requested(&mut shutdown) => {
                return Err(PipelineError::Cancelled(operation.to_string()));
            }
        }
    }
}

fn is_shutting_down(shutdown: &Option<ShutdownSignal>) -> bool {
    shutdown.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once shutdown is flagged; never resolves without a signal.
async fn shutdown_requested(shutdown: &mut Option<ShutdownSignal>) {
    let Some(rx) = shutdown.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
