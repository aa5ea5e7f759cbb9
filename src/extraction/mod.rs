//! Extraction adapters: turn a raw file into text or a derived artifact.
//!
//! Every adapter wraps one external job API with the same shape:
//! submit a job, poll its status until terminal, then fetch the result.
//! [`run_extraction`] drives that cycle with the shared retry and polling
//! policies so adapters only describe the wire format.

mod document;
mod multimodal;
mod speech;
mod vision;

pub use document::DocumentAdapter;
pub use multimodal::MultimodalAdapter;
pub use speech::SpeechAdapter;
pub use vision::VisionAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::models::{FileDescriptor, JobHandle, JobSnapshot, JobStatus};
use crate::retry::{poll_until_terminal, retry, PollPolicy, RetryPolicy, ShutdownSignal};

/// Available extraction paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionKind {
    /// Batch speech transcription.
    Speech,
    /// Document Intelligence read, or PII redaction.
    Document,
    /// Multimodal LLM reading the document directly.
    Multimodal,
    /// Image analysis.
    Vision,
}

impl ExtractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionKind::Speech => "speech",
            ExtractionKind::Document => "document",
            ExtractionKind::Multimodal => "multimodal",
            ExtractionKind::Vision => "vision",
        }
    }
}

impl std::fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What an extraction produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtractionResult {
    Text { text: String },
    /// A file written by the service, e.g. a redacted document.
    Artifact { location: String },
}

impl ExtractionResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Artifact { .. } => None,
        }
    }
}

/// One external extraction service.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    fn kind(&self) -> ExtractionKind;

    /// Interval and ceiling for this adapter's polling loop.
    fn poll_policy(&self) -> PollPolicy;

    /// Submit a job for the file.
    async fn submit(&self, file: &FileDescriptor, instance_id: &str) -> Result<JobHandle>;

    /// Fetch the current status of a remote job.
    async fn poll(&self, location: &str) -> Result<JobSnapshot>;

    /// Turn a succeeded snapshot into the extraction result.
    async fn fetch_result(
        &self,
        file: &FileDescriptor,
        snapshot: &JobSnapshot,
    ) -> Result<ExtractionResult>;

    /// Diagnostic payload to attach when the job fails.
    fn failure_details(&self, snapshot: &JobSnapshot) -> serde_json::Value {
        snapshot
            .payload
            .get("error")
            .or_else(|| snapshot.payload.get("errors"))
            .cloned()
            .unwrap_or_else(|| snapshot.payload.clone())
    }
}

/// Adapters available to the orchestration core, keyed by kind.
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    adapters: HashMap<ExtractionKind, Arc<dyn ExtractionAdapter>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one of the same kind.
    pub fn register(&mut self, adapter: Arc<dyn ExtractionAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ExtractionAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, kind: ExtractionKind) -> Option<&Arc<dyn ExtractionAdapter>> {
        self.adapters.get(&kind)
    }
}

/// Submit, poll and fetch one extraction with retries on every call.
///
/// A job that ends `Failed` or `Cancelled` becomes [`PipelineError::JobFailed`]
/// with the service's diagnostic payload; it is not retried.
pub async fn run_extraction(
    adapter: &dyn ExtractionAdapter,
    file: &FileDescriptor,
    instance_id: &str,
    retry_policy: &RetryPolicy,
    shutdown: Option<ShutdownSignal>,
) -> Result<ExtractionResult> {
    let kind = adapter.kind();
    let submit_op = format!("{}.submit", kind);
    let poll_op = format!("{}.poll", kind);
    let fetch_op = format!("{}.fetch", kind);

    let handle = retry(retry_policy, &submit_op, || adapter.submit(file, instance_id)).await?;

    let snapshot = match handle {
        JobHandle::Ready { payload } => JobSnapshot::succeeded(payload),
        JobHandle::Remote { location } => {
            info!("{}: job submitted for {} ({})", kind, file.name, location);
            poll_until_terminal(
                &poll_op,
                &adapter.poll_policy(),
                retry_policy,
                shutdown,
                || adapter.poll(&location),
            )
            .await?
        }
    };

    match snapshot.status {
        JobStatus::Succeeded => {
            retry(retry_policy, &fetch_op, || adapter.fetch_result(file, &snapshot)).await
        }
        status => {
            let details = adapter.failure_details(&snapshot);
            warn!("{}: job for {} ended {}: {}", kind, file.name, status, details);
            Err(PipelineError::JobFailed {
                operation: poll_op,
                status,
                details,
            })
        }
    }
}

/// Read a status document's `status` field.
pub(crate) fn parse_status(operation: &str, payload: serde_json::Value) -> Result<JobSnapshot> {
    let raw = payload
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| PipelineError::protocol(operation, "missing status field"))?;
    let status = JobStatus::from_str(raw)
        .ok_or_else(|| PipelineError::protocol(operation, format!("unknown status '{}'", raw)))?;
    Ok(JobSnapshot::new(status, payload))
}

/// Endpoint that must be configured for an adapter to run.
pub(crate) fn require_endpoint<'a>(endpoint: &'a Option<String>, name: &str) -> Result<&'a str> {
    endpoint
        .as_deref()
        .map(|e| e.trim_end_matches('/'))
        .filter(|e| !e.is_empty())
        .ok_or_else(|| PipelineError::Config(format!("{} is not configured", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct ScriptedAdapter {
        statuses: Vec<JobStatus>,
        polls: AtomicU32,
        submit_failures: u32,
        submits: AtomicU32,
    }

    impl ScriptedAdapter {
        fn new(statuses: Vec<JobStatus>) -> Self {
            Self {
                statuses,
                polls: AtomicU32::new(0),
                submit_failures: 0,
                submits: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ExtractionAdapter for ScriptedAdapter {
        fn kind(&self) -> ExtractionKind {
            ExtractionKind::Speech
        }

        fn poll_policy(&self) -> PollPolicy {
            PollPolicy::new(Duration::from_secs(10), Duration::from_secs(300))
        }

        async fn submit(&self, _file: &FileDescriptor, _id: &str) -> Result<JobHandle> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            if n < self.submit_failures {
                return Err(PipelineError::transient("speech.submit", "HTTP 429"));
            }
            Ok(JobHandle::remote("https://svc/transcriptions/1"))
        }

        async fn poll(&self, _location: &str) -> Result<JobSnapshot> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) as usize;
            let status = self.statuses[n.min(self.statuses.len() - 1)];
            Ok(JobSnapshot::new(
                status,
                json!({"status": status.as_str(), "properties": {"error": {"code": "InvalidData"}}}),
            ))
        }

        async fn fetch_result(
            &self,
            _file: &FileDescriptor,
            _snapshot: &JobSnapshot,
        ) -> Result<ExtractionResult> {
            Ok(ExtractionResult::text("hello world"))
        }

        fn failure_details(&self, snapshot: &JobSnapshot) -> serde_json::Value {
            snapshot.payload["properties"]["error"].clone()
        }
    }

    fn file() -> FileDescriptor {
        FileDescriptor::new("call_42.wav", "bronze", "https://acct/bronze/call_42.wav")
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_poll_fetch() {
        let adapter = ScriptedAdapter::new(vec![JobStatus::Running, JobStatus::Succeeded]);
        let result = run_extraction(&adapter, &file(), "inst-1", &RetryPolicy::default(), None)
            .await
            .unwrap();
        assert_eq!(result.as_text(), Some("hello world"));
        assert_eq!(adapter.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_failure_carries_details() {
        let adapter = ScriptedAdapter::new(vec![JobStatus::Failed]);
        let err = run_extraction(&adapter, &file(), "inst-1", &RetryPolicy::default(), None)
            .await
            .unwrap_err();
        match err {
            PipelineError::JobFailed {
                status, details, ..
            } => {
                assert_eq!(status, JobStatus::Failed);
                assert_eq!(details["code"], "InvalidData");
            }
            other => panic!("expected JobFailed, got {:?}", other),
        }
        assert_eq!(adapter.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_submit_is_retried() {
        let mut adapter = ScriptedAdapter::new(vec![JobStatus::Succeeded]);
        adapter.submit_failures = 2;
        let result =
            run_extraction(&adapter, &file(), "inst-1", &RetryPolicy::default(), None).await;
        assert!(result.is_ok());
        assert_eq!(adapter.submits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_parse_status() {
        let snap = parse_status("op", json!({"status": "running"})).unwrap();
        assert_eq!(snap.status, JobStatus::Running);
        assert!(parse_status("op", json!({})).is_err());
        assert!(parse_status("op", json!({"status": "exploded"})).is_err());
    }

    #[test]
    fn test_require_endpoint() {
        assert_eq!(
            require_endpoint(&Some("https://svc/".into()), "X").unwrap(),
            "https://svc"
        );
        assert!(require_endpoint(&None, "X").is_err());
        assert!(require_endpoint(&Some(String::new()), "X").is_err());
    }
}
