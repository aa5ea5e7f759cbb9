//! Batch speech-to-text transcription.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{parse_status, require_endpoint, ExtractionAdapter, ExtractionKind, ExtractionResult};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::http_client::{ApiClient, Credential};
use crate::models::{FileDescriptor, JobHandle, JobSnapshot};
use crate::retry::PollPolicy;

const API_VERSION: &str = "2025-10-15";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptionRequest<'a> {
    display_name: &'a str,
    locale: &'a str,
    content_urls: [&'a str; 1],
    properties: TranscriptionProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptionProperties {
    word_level_timestamps_enabled: bool,
    display_form_word_level_timestamps_enabled: bool,
    punctuation_mode: &'static str,
    profanity_filter_mode: &'static str,
    time_to_live_hours: u32,
}

impl Default for TranscriptionProperties {
    fn default() -> Self {
        Self {
            word_level_timestamps_enabled: false,
            display_form_word_level_timestamps_enabled: false,
            punctuation_mode: "DictatedAndAutomatic",
            profanity_filter_mode: "Masked",
            time_to_live_hours: 48,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    values: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    links: FileLinks,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileLinks {
    content_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptContent {
    #[serde(default)]
    combined_recognized_phrases: Vec<CombinedPhrase>,
}

#[derive(Debug, Deserialize)]
struct CombinedPhrase {
    display: String,
}

/// Speech transcription adapter.
pub struct SpeechAdapter {
    http: ApiClient,
    credential: Credential,
    endpoint: Option<String>,
    locale: String,
    poll_policy: PollPolicy,
}

impl SpeechAdapter {
    pub fn new(settings: &Settings, http: ApiClient) -> Self {
        Self {
            http,
            credential: Credential::resolve(
                KEY_HEADER,
                settings.speech.api_key.as_deref(),
                settings.access_token(),
            ),
            endpoint: settings.speech.endpoint.clone(),
            locale: settings.speech.locale.clone(),
            poll_policy: settings.speech_poll_policy(),
        }
    }

    fn submit_url(&self) -> Result<String> {
        let endpoint = require_endpoint(&self.endpoint, "AI_SERVICES_ENDPOINT")?;
        Ok(format!(
            "{}/speechtotext/transcriptions:submit?api-version={}",
            endpoint, API_VERSION
        ))
    }
}

#[async_trait]
impl ExtractionAdapter for SpeechAdapter {
    fn kind(&self) -> ExtractionKind {
        ExtractionKind::Speech
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll_policy.clone()
    }

    async fn submit(&self, file: &FileDescriptor, instance_id: &str) -> Result<JobHandle> {
        let url = self.submit_url()?;
        let request = TranscriptionRequest {
            display_name: instance_id,
            locale: &self.locale,
            content_urls: [file.source_uri.as_str()],
            properties: TranscriptionProperties::default(),
        };

        info!("Submitting transcription for {} in {}", file.name, file.container_id);
        let response: Value = self
            .http
            .post_json("speech.submit", &url, &self.credential, &request)
            .await?
            .json()?;

        let location = response
            .get("self")
            .and_then(|s| s.as_str())
            .ok_or_else(|| PipelineError::protocol("speech.submit", "response has no 'self' link"))?;
        Ok(JobHandle::remote(location))
    }

    async fn poll(&self, location: &str) -> Result<JobSnapshot> {
        let payload: Value = self
            .http
            .get("speech.poll", location, &self.credential)
            .await?
            .json()?;
        parse_status("speech.poll", payload)
    }

    async fn fetch_result(
        &self,
        _file: &FileDescriptor,
        snapshot: &JobSnapshot,
    ) -> Result<ExtractionResult> {
        let files_url = snapshot
            .payload
            .pointer("/links/files")
            .and_then(|f| f.as_str())
            .ok_or_else(|| PipelineError::protocol("speech.fetch", "status has no files link"))?;

        let files: FileList = self
            .http
            .get("speech.fetch", files_url, &self.credential)
            .await?
            .json()?;
        let content_url = files
            .values
            .into_iter()
            .next()
            .map(|f| f.links.content_url)
            .ok_or_else(|| PipelineError::protocol("speech.fetch", "no result files"))?;

        // Result files are served from pre-signed URLs.
        let content: TranscriptContent = self
            .http
            .get("speech.fetch", &content_url, &Credential::None)
            .await?
            .json()?;
        let text = content
            .combined_recognized_phrases
            .into_iter()
            .next()
            .map(|p| p.display)
            .ok_or_else(|| PipelineError::protocol("speech.fetch", "no recognized phrases"))?;

        Ok(ExtractionResult::text(text))
    }

    fn failure_details(&self, snapshot: &JobSnapshot) -> Value {
        snapshot
            .payload
            .pointer("/properties/error")
            .cloned()
            .unwrap_or_else(|| Value::String("Unknown error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::DEFAULT_TIMEOUT;
    use crate::models::JobStatus;
    use serde_json::json;

    fn adapter(endpoint: Option<&str>) -> SpeechAdapter {
        let mut settings = Settings::default();
        settings.speech.endpoint = endpoint.map(String::from);
        settings.speech.api_key = Some("key".into());
        SpeechAdapter::new(&settings, ApiClient::new(DEFAULT_TIMEOUT).unwrap())
    }

    #[test]
    fn test_submit_url() {
        let adapter = adapter(Some("https://ai.example"));
        assert_eq!(
            adapter.submit_url().unwrap(),
            "https://ai.example/speechtotext/transcriptions:submit?api-version=2025-10-15"
        );
        assert!(matches!(
            self::adapter(None).submit_url(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = TranscriptionRequest {
            display_name: "inst-1",
            locale: "en-US",
            content_urls: ["https://acct/bronze/call_42.wav"],
            properties: TranscriptionProperties::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contentUrls"][0], "https://acct/bronze/call_42.wav");
        assert_eq!(json["properties"]["timeToLiveHours"], 48);
        assert_eq!(json["properties"]["punctuationMode"], "DictatedAndAutomatic");
    }

    #[test]
    fn test_failure_details() {
        let adapter = adapter(Some("https://ai.example"));
        let failed = JobSnapshot::new(
            JobStatus::Failed,
            json!({"status": "Failed", "properties": {"error": {"code": "InvalidData"}}}),
        );
        assert_eq!(adapter.failure_details(&failed)["code"], "InvalidData");

        let bare = JobSnapshot::new(JobStatus::Failed, json!({"status": "Failed"}));
        assert_eq!(adapter.failure_details(&bare), "Unknown error");
    }
}
