//! Document extraction: text read via Document Intelligence, or a
//! PII-redacted copy produced by the Language service.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{parse_status, require_endpoint, ExtractionAdapter, ExtractionKind, ExtractionResult};
use crate::config::{DocumentMode, Settings};
use crate::error::{PipelineError, Result};
use crate::http_client::{ApiClient, Credential};
use crate::models::{FileDescriptor, JobHandle, JobSnapshot};
use crate::retry::PollPolicy;

const ANALYZE_API_VERSION: &str = "2024-11-30";
const LANGUAGE_API_VERSION: &str = "2024-11-15-preview";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    url_source: &'a str,
}

/// Document adapter covering both document modes.
pub struct DocumentAdapter {
    http: ApiClient,
    mode: DocumentMode,
    endpoint: Option<String>,
    credential: Credential,
    model_id: String,
    language_endpoint: Option<String>,
    language_credential: Credential,
    language: String,
    target_container_url: Option<String>,
    poll_policy: PollPolicy,
}

impl DocumentAdapter {
    pub fn new(settings: &Settings, http: ApiClient) -> Self {
        let doc = &settings.document;
        Self {
            http,
            mode: doc.mode,
            endpoint: doc.endpoint.clone(),
            credential: Credential::resolve(
                KEY_HEADER,
                doc.api_key.as_deref(),
                settings.access_token(),
            ),
            model_id: doc.model_id.clone(),
            language_endpoint: doc.language_endpoint.clone(),
            language_credential: Credential::resolve(
                KEY_HEADER,
                doc.language_api_key.as_deref(),
                settings.access_token(),
            ),
            language: doc.language.clone(),
            target_container_url: settings
                .storage
                .container_url(&settings.storage.target_container),
            poll_policy: settings.document_poll_policy(),
        }
    }

    pub fn mode(&self) -> DocumentMode {
        self.mode
    }

    fn credential(&self) -> &Credential {
        match self.mode {
            DocumentMode::Extract => &self.credential,
            DocumentMode::Redact => &self.language_credential,
        }
    }

    fn analyze_url(&self) -> Result<String> {
        let endpoint = require_endpoint(&self.endpoint, "DOCUMENT_ENDPOINT")?;
        Ok(format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            endpoint, self.model_id, ANALYZE_API_VERSION
        ))
    }

    fn redaction_url(&self) -> Result<String> {
        let endpoint = require_endpoint(&self.language_endpoint, "LANGUAGE_ENDPOINT")?;
        Ok(format!(
            "{}/language/analyze-documents/jobs?api-version={}",
            endpoint, LANGUAGE_API_VERSION
        ))
    }

    fn redaction_request(&self, file: &FileDescriptor) -> Result<Value> {
        let target = self.target_container_url.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "redaction needs STORAGE_ACCOUNT_URL for the target container".to_string(),
            )
        })?;

        Ok(json!({
            "displayName": format!("PII Redaction - {}", file.basename()),
            "analysisInput": {
                "documents": [{
                    "language": self.language,
                    "id": "doc-1",
                    "source": {"location": file.source_uri},
                    "target": {"location": target},
                }]
            },
            "tasks": [{
                "kind": "PiiEntityRecognition",
                "taskName": "Redact PII",
                "parameters": {
                    "redactionPolicy": {"policyKind": "entityMask"},
                    "excludeExtractionData": true,
                },
            }],
        }))
    }
}

/// First redacted document location in a completed redaction job.
fn redacted_location(payload: &Value) -> Option<&str> {
    payload
        .pointer("/tasks/items/0/results/documents/0/targets")?
        .as_array()?
        .iter()
        .filter_map(|t| t.get("location").and_then(|l| l.as_str()))
        .find(|location| !location.ends_with(".json"))
}

#[async_trait]
impl ExtractionAdapter for DocumentAdapter {
    fn kind(&self) -> ExtractionKind {
        ExtractionKind::Document
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll_policy.clone()
    }

    async fn submit(&self, file: &FileDescriptor, _instance_id: &str) -> Result<JobHandle> {
        let response = match self.mode {
            DocumentMode::Extract => {
                info!("Submitting {} for text extraction", file.name);
                let body = AnalyzeRequest {
                    url_source: &file.source_uri,
                };
                self.http
                    .post_json("document.submit", &self.analyze_url()?, &self.credential, &body)
                    .await?
            }
            DocumentMode::Redact => {
                info!("Submitting {} for PII redaction", file.name);
                let body = self.redaction_request(file)?;
                self.http
                    .post_json(
                        "document.submit",
                        &self.redaction_url()?,
                        &self.language_credential,
                        &body,
                    )
                    .await?
            }
        };

        let location = response.require_header("operation-location")?;
        Ok(JobHandle::remote(location))
    }

    async fn poll(&self, location: &str) -> Result<JobSnapshot> {
        let payload: Value = self
            .http
            .get("document.poll", location, self.credential())
            .await?
            .json()?;
        parse_status("document.poll", payload)
    }

    async fn fetch_result(
        &self,
        file: &FileDescriptor,
        snapshot: &JobSnapshot,
    ) -> Result<ExtractionResult> {
        match self.mode {
            DocumentMode::Extract => {
                let content = snapshot
                    .payload
                    .pointer("/analyzeResult/content")
                    .and_then(|c| c.as_str())
                    .ok_or_else(|| {
                        PipelineError::protocol("document.fetch", "missing analyzeResult.content")
                    })?;
                Ok(ExtractionResult::text(content))
            }
            DocumentMode::Redact => match redacted_location(&snapshot.payload) {
                Some(location) => {
                    info!("Redacted copy of {} created at {}", file.name, location);
                    Ok(ExtractionResult::Artifact {
                        location: location.to_string(),
                    })
                }
                None => {
                    warn!("No redacted document in results for {}", file.name);
                    Err(PipelineError::protocol(
                        "document.fetch",
                        "no redacted document in job results",
                    ))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::DEFAULT_TIMEOUT;

    fn settings(mode: DocumentMode) -> Settings {
        let mut settings = Settings::default();
        settings.document.mode = mode;
        settings.document.endpoint = Some("https://docs.example".into());
        settings.document.language_endpoint = Some("https://lang.example".into());
        settings.storage.account_url = Some("https://acct.blob.core.windows.net".into());
        settings
    }

    fn adapter(mode: DocumentMode) -> DocumentAdapter {
        DocumentAdapter::new(&settings(mode), ApiClient::new(DEFAULT_TIMEOUT).unwrap())
    }

    #[test]
    fn test_urls() {
        let adapter = adapter(DocumentMode::Extract);
        assert_eq!(
            adapter.analyze_url().unwrap(),
            "https://docs.example/documentintelligence/documentModels/prebuilt-read:analyze?api-version=2024-11-30"
        );
        assert_eq!(
            adapter.redaction_url().unwrap(),
            "https://lang.example/language/analyze-documents/jobs?api-version=2024-11-15-preview"
        );
    }

    #[test]
    fn test_redaction_request() {
        let adapter = adapter(DocumentMode::Redact);
        let file = FileDescriptor::new(
            "bronze/contract.pdf",
            "bronze",
            "https://acct.blob.core.windows.net/bronze/contract.pdf",
        );
        let body = adapter.redaction_request(&file).unwrap();
        assert_eq!(body["displayName"], "PII Redaction - contract.pdf");
        let doc = &body["analysisInput"]["documents"][0];
        assert_eq!(doc["source"]["location"], file.source_uri);
        assert_eq!(
            doc["target"]["location"],
            "https://acct.blob.core.windows.net/silver"
        );
        assert_eq!(body["tasks"][0]["parameters"]["excludeExtractionData"], true);
    }

    #[test]
    fn test_redaction_requires_account_url() {
        let mut settings = settings(DocumentMode::Redact);
        settings.storage.account_url = None;
        let adapter = DocumentAdapter::new(&settings, ApiClient::new(DEFAULT_TIMEOUT).unwrap());
        let file = FileDescriptor::new("a.pdf", "bronze", "file:///a.pdf");
        assert!(matches!(
            adapter.redaction_request(&file),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_redacted_location_skips_json() {
        let payload = json!({
            "status": "succeeded",
            "tasks": {"items": [{"results": {"documents": [{"targets": [
                {"location": "https://acct/silver/job/contract.json"},
                {"location": "https://acct/silver/job/contract.pdf"}
            ]}]}}]}
        });
        assert_eq!(
            redacted_location(&payload),
            Some("https://acct/silver/job/contract.pdf")
        );
        assert_eq!(redacted_location(&json!({"status": "succeeded"})), None);
    }
}
