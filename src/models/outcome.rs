//! Terminal record of one orchestration instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FileDescriptor;
use crate::error::PipelineError;
use crate::extraction::ExtractionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Skipped,
    Failed,
}

/// The step that failed and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    pub step: String,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StepFailure {
    pub fn from_error(step: &str, err: &PipelineError) -> Self {
        Self {
            step: step.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            details: err.details().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationOutcome {
    pub instance_id: String,
    #[serde(rename = "blob")]
    pub file: FileDescriptor,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<ExtractionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OrchestrationOutcome {
    /// Start a record for an instance; the caller fills in results.
    pub fn begin(instance_id: impl Into<String>, file: FileDescriptor) -> Self {
        let now = Utc::now();
        Self {
            instance_id: instance_id.into(),
            file,
            status: OutcomeStatus::Completed,
            route: None,
            extracted_text: None,
            enriched_text: None,
            persisted_location: None,
            error: None,
            failure: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn skipped(mut self, reason: String) -> Self {
        self.status = OutcomeStatus::Skipped;
        self.error = Some(reason);
        self.finish()
    }

    pub fn failed(mut self, step: &str, err: &PipelineError) -> Self {
        self.status = OutcomeStatus::Failed;
        self.error = Some(err.to_string());
        self.failure = Some(StepFailure::from_error(step, err));
        self.finish()
    }

    pub fn completed(mut self) -> Self {
        self.status = OutcomeStatus::Completed;
        self.finish()
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}
