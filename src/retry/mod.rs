//! Uniform retry policy for external calls.
//!
//! Every submit, poll fetch, enrichment and persistence call goes through
//! [`retry`]. Only transient failures are retried; job-level failures and
//! protocol errors are returned immediately.

mod poll;

pub use poll::{poll_until_terminal, PollPolicy, ShutdownSignal};

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Upper bound for a single backoff wait.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry settings applied per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait before the second attempt.
    #[serde(default = "default_initial_backoff", with = "duration_ms")]
    pub initial_backoff: Duration,
    /// Multiplier applied to the wait after each failure. 1.0 is a fixed backoff.
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_coefficient() -> f64 {
    1.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            backoff_coefficient: default_backoff_coefficient(),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: backoff,
            backoff_coefficient: 1.0,
        }
    }

    /// Wait after the given failed attempt (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_coefficient.max(1.0).powi(attempt as i32);
        self.initial_backoff.mul_f64(factor).min(MAX_BACKOFF)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `call` until it succeeds, fails permanently, or runs out of attempts.
///
/// A `Retry-After` hint from the service lengthens the wait but never
/// shortens it below the policy's backoff.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                warn!("{} failed after {} attempts: {}", operation, attempt, err);
                return Err(PipelineError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                let backoff = policy.delay_for(attempt - 1);
                let wait = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation, attempt, max_attempts, wait, err
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
