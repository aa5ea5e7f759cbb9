//! Handles and status snapshots for external long-running jobs.

use serde::{Deserialize, Serialize};

/// Status reported by an external job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Parse the status strings used by the speech, document and language
    /// services. Queued states count as `Running`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "notstarted" | "running" | "queued" | "inprogress" | "cancelling" => {
                Some(Self::Running)
            }
            "succeeded" | "partiallycompleted" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a submitted job, owned by the adapter that created it.
#[derive(Debug, Clone, PartialEq)]
pub enum JobHandle {
    /// Status location to poll.
    Remote { location: String },
    /// Synchronous services finish at submit time and carry their payload.
    Ready { payload: serde_json::Value },
}

impl JobHandle {
    pub fn remote(location: impl Into<String>) -> Self {
        Self::Remote {
            location: location.into(),
        }
    }
}

/// One observation of a job: its status plus the raw status document.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub payload: serde_json::Value,
}

impl JobSnapshot {
    pub fn new(status: JobStatus, payload: serde_json::Value) -> Self {
        Self { status, payload }
    }

    pub fn succeeded(payload: serde_json::Value) -> Self {
        Self::new(JobStatus::Succeeded, payload)
    }
}
