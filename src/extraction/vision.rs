//! Image analysis: caption plus OCR'd lines.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{require_endpoint, ExtractionAdapter, ExtractionKind, ExtractionResult};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::http_client::{ApiClient, Credential};
use crate::models::{FileDescriptor, JobHandle, JobSnapshot};
use crate::retry::PollPolicy;

const API_VERSION: &str = "2024-02-01";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    url: &'a str,
}

pub struct VisionAdapter {
    http: ApiClient,
    credential: Credential,
    endpoint: Option<String>,
}

impl VisionAdapter {
    pub fn new(settings: &Settings, http: ApiClient) -> Self {
        Self {
            http,
            credential: Credential::resolve(
                KEY_HEADER,
                settings.vision.api_key.as_deref(),
                settings.access_token(),
            ),
            endpoint: settings.vision.endpoint.clone(),
        }
    }

    fn analyze_url(&self) -> Result<String> {
        let endpoint = require_endpoint(&self.endpoint, "VISION_ENDPOINT")?;
        Ok(format!(
            "{}/computervision/imageanalysis:analyze?api-version={}&features=caption,read",
            endpoint, API_VERSION
        ))
    }
}

/// Join the caption and every read line into one text block.
fn analysis_text(payload: &Value) -> String {
    let caption = payload
        .pointer("/captionResult/text")
        .and_then(|t| t.as_str());

    let lines = payload
        .pointer("/readResult/blocks")
        .and_then(|b| b.as_array())
        .into_iter()
        .flatten()
        .filter_map(|block| block.get("lines").and_then(|l| l.as_array()))
        .flatten()
        .filter_map(|line| line.get("text").and_then(|t| t.as_str()));

    caption.into_iter().chain(lines).collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl ExtractionAdapter for VisionAdapter {
    fn kind(&self) -> ExtractionKind {
        ExtractionKind::Vision
    }

    /// Analysis completes at submit; never polled.
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::ZERO, Duration::ZERO)
    }

    async fn submit(&self, file: &FileDescriptor, _instance_id: &str) -> Result<JobHandle> {
        let body = AnalyzeRequest {
            url: &file.source_uri,
        };
        let payload: Value = self
            .http
            .post_json("vision.submit", &self.analyze_url()?, &self.credential, &body)
            .await?
            .json()?;
        Ok(JobHandle::Ready { payload })
    }

    async fn poll(&self, _location: &str) -> Result<JobSnapshot> {
        Err(PipelineError::protocol(
            "vision.poll",
            "image analysis completes at submit",
        ))
    }

    async fn fetch_result(
        &self,
        _file: &FileDescriptor,
        snapshot: &JobSnapshot,
    ) -> Result<ExtractionResult> {
        let text = analysis_text(&snapshot.payload);
        if text.is_empty() {
            return Err(PipelineError::protocol(
                "vision.fetch",
                "no caption or text in analysis",
            ));
        }
        Ok(ExtractionResult::text(text))
    }
}
