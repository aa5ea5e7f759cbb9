//! Multimodal LLM reading a document directly.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{ExtractionAdapter, ExtractionKind, ExtractionResult};
use crate::error::{PipelineError, Result};
use crate::llm::LlmClient;
use crate::models::{FileDescriptor, JobHandle, JobSnapshot};
use crate::retry::PollPolicy;

/// A single chat-completion call; the job is already complete at submit.
pub struct MultimodalAdapter {
    llm: LlmClient,
}

impl MultimodalAdapter {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ExtractionAdapter for MultimodalAdapter {
    fn kind(&self) -> ExtractionKind {
        ExtractionKind::Multimodal
    }

    /// Never polled.
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::ZERO, Duration::ZERO)
    }

    async fn submit(&self, file: &FileDescriptor, instance_id: &str) -> Result<JobHandle> {
        let text = self.llm.read_file(&file.source_uri, instance_id).await?;
        Ok(JobHandle::Ready {
            payload: json!({ "text": text }),
        })
    }

    async fn poll(&self, _location: &str) -> Result<JobSnapshot> {
        Err(PipelineError::protocol(
            "multimodal.poll",
            "multimodal jobs complete at submit",
        ))
    }

    async fn fetch_result(
        &self,
        _file: &FileDescriptor,
        snapshot: &JobSnapshot,
    ) -> Result<ExtractionResult> {
        snapshot
            .payload
            .get("text")
            .and_then(|t| t.as_str())
            .map(ExtractionResult::text)
            .ok_or_else(|| PipelineError::protocol("multimodal.fetch", "no text in completion"))
    }
}
