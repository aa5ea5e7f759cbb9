//! Error types shared by the adapters and the orchestration core.

use std::time::Duration;

use thiserror::Error;

use crate::models::JobStatus;

/// Errors raised while processing a file.
///
/// Only [`PipelineError::Transient`] is retried. Everything else is terminal
/// for the step that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network failure, timeout, 408, 429 or 5xx.
    #[error("{operation}: transient failure: {message}")]
    Transient {
        operation: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Non-retryable HTTP status from an external service.
    #[error("{operation}: HTTP {status}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    /// The external job reached `Failed` or `Cancelled`.
    #[error("{operation}: job ended with status {status}")]
    JobFailed {
        operation: String,
        status: JobStatus,
        details: serde_json::Value,
    },

    /// Polling did not reach a terminal state within the ceiling.
    #[error("{operation}: timed out after {elapsed:?}")]
    TimedOut { operation: String, elapsed: Duration },

    /// A retried call failed on every attempt.
    #[error("{operation}: gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<PipelineError>,
    },

    /// Shutdown was requested while waiting on an external job.
    #[error("{0}: cancelled by shutdown")]
    Cancelled(String),

    /// The response did not have the expected shape.
    #[error("{operation}: unexpected response: {message}")]
    Protocol { operation: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn protocol(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the retry policy should try the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Server-suggested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short machine-readable name used in outcomes and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Http { .. } => "http",
            Self::JobFailed { .. } => "job_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Cancelled(_) => "cancelled",
            Self::Protocol { .. } => "protocol",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
        }
    }

    /// Diagnostic payload reported by the external system.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::JobFailed { details, .. } => Some(details),
            Self::RetriesExhausted { last, .. } => last.details(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(PipelineError::transient("speech.submit", "connection reset").is_retryable());
        assert!(!PipelineError::protocol("speech.submit", "missing self").is_retryable());
        assert!(!PipelineError::TimedOut {
            operation: "document.poll".into(),
            elapsed: Duration::from_secs(300),
        }
        .is_retryable());
        assert!(!PipelineError::JobFailed {
            operation: "speech.poll".into(),
            status: JobStatus::Failed,
            details: serde_json::json!({"code": "InvalidData"}),
        }
        .is_retryable());
    }

    #[test]
    fn details_survive_retry_wrapping() {
        let err = PipelineError::RetriesExhausted {
            operation: "speech.poll".into(),
            attempts: 5,
            last: Box::new(PipelineError::JobFailed {
                operation: "speech.poll".into(),
                status: JobStatus::Failed,
                details: serde_json::json!({"code": "InvalidData"}),
            }),
        };
        assert_eq!(err.kind(), "retries_exhausted");
        assert_eq!(err.details().unwrap()["code"], "InvalidData");
    }
}
