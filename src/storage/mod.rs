//! Blob persistence: enrichment results and relocated artifacts.

mod azure;
mod local;

pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Settings, StorageBackend};
use crate::error::{PipelineError, Result};
use crate::extraction::ExtractionKind;
use crate::http_client::ApiClient;
use crate::models::{FileDescriptor, JobSnapshot, JobStatus};
use crate::retry::{poll_until_terminal, retry, PollPolicy, RetryPolicy};

/// Interval between copy-status checks while relocating an artifact.
const COPY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// State of a server-side blob copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Pending,
    Success,
    Aborted,
    Failed,
}

impl CopyStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    fn as_job_status(self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Running,
            Self::Success => JobStatus::Succeeded,
            Self::Aborted => JobStatus::Cancelled,
            Self::Failed => JobStatus::Failed,
        }
    }
}

/// Container/name addressed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create or overwrite a blob.
    async fn write(&self, container: &str, name: &str, data: Vec<u8>, content_type: &str)
        -> Result<()>;

    /// Start copying `source_url` into `container/name`.
    async fn copy(&self, container: &str, name: &str, source_url: &str) -> Result<CopyStatus>;

    async fn copy_status(&self, container: &str, name: &str) -> Result<CopyStatus>;

    /// Delete a blob. Deleting a missing blob succeeds.
    async fn delete(&self, container: &str, name: &str) -> Result<()>;

    /// Address of a container, as it appears in artifact locations.
    fn container_url(&self, container: &str) -> String;
}

/// Build the store selected by the settings.
pub fn store_from_settings(settings: &Settings, http: ApiClient) -> Result<Arc<dyn BlobStore>> {
    match settings.storage.backend {
        StorageBackend::Local => Ok(Arc::new(LocalBlobStore::new(&settings.storage.local_root))),
        StorageBackend::Azure => {
            let account_url = settings.storage.account_url.as_deref().ok_or_else(|| {
                PipelineError::Config("azure storage needs STORAGE_ACCOUNT_URL".to_string())
            })?;
            Ok(Arc::new(AzureBlobStore::new(
                http,
                account_url,
                settings.access_token(),
            )?))
        }
    }
}

/// What gets persisted for a completed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRecord {
    pub file_name: String,
    pub source_uri: String,
    pub instance_id: String,
    pub extraction: ExtractionKind,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl EnrichmentRecord {
    pub fn new(
        file: &FileDescriptor,
        instance_id: &str,
        extraction: ExtractionKind,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file.name.clone(),
            source_uri: file.source_uri.clone(),
            instance_id: instance_id.to_string(),
            extraction,
            summary: summary.into(),
            created_at: Utc::now(),
        }
    }
}

/// Output blob name for a file: `<stem>.json`.
pub fn output_name(file: &FileDescriptor) -> String {
    format!("{}.json", file.stem())
}

/// Name of a relocated redacted document: `<stem>_redacted.<ext>`.
pub fn redacted_name(file: &FileDescriptor) -> String {
    let ext = file.extension();
    let ext = if ext.is_empty() { "pdf" } else { ext.as_str() };
    format!("{}_redacted.{}", file.stem(), ext)
}

/// Capability the orchestration core uses to persist results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist a record and return its location as `<container>/<name>`.
    async fn persist(&self, file: &FileDescriptor, record: &EnrichmentRecord) -> Result<String>;
}

/// Writes enrichment records as JSON into the final output container.
pub struct ResultWriter {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }
}

#[async_trait]
impl ResultSink for ResultWriter {
    async fn persist(&self, file: &FileDescriptor, record: &EnrichmentRecord) -> Result<String> {
        let name = output_name(file);
        let data = serde_json::to_vec_pretty(record)
            .map_err(|e| PipelineError::Storage(format!("serializing record: {}", e)))?;

        // Same file, same name: re-delivery overwrites rather than duplicates.
        self.store
            .write(&self.container, &name, data, "application/json")
            .await?;
        let location = format!("{}/{}", self.container, name);
        info!("Persisted result for {} to {}", file.name, location);
        Ok(location)
    }
}

/// Moves a redacted artifact from its nested job folder to the root of
/// the target container.
pub struct ArtifactRelocator {
    store: Arc<dyn BlobStore>,
    container: String,
    copy_policy: PollPolicy,
}

impl ArtifactRelocator {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>, ceiling: Duration) -> Self {
        Self {
            store,
            container: container.into(),
            copy_policy: PollPolicy::new(COPY_POLL_INTERVAL, ceiling),
        }
    }

    /// Blob path of `location` inside the target container.
    fn nested_path<'a>(&self, location: &'a str) -> Result<&'a str> {
        let prefix = format!(
            "{}/",
            self.store.container_url(&self.container).trim_end_matches('/')
        );
        location
            .strip_prefix(prefix.as_str())
            .filter(|path| !path.is_empty())
            .ok_or_else(|| {
                PipelineError::Storage(format!(
                    "artifact {} is not in container {}",
                    location, self.container
                ))
            })
    }

    /// Copy, wait for the copy to settle, delete the original.
    /// Returns the new location as `<container>/<name>`.
    pub async fn relocate(
        &self,
        file: &FileDescriptor,
        location: &str,
        retry_policy: &RetryPolicy,
    ) -> Result<String> {
        let nested = self.nested_path(location)?;
        let name = redacted_name(file);
        let container = self.container.as_str();

        info!("Moving {} to {}/{}", nested, container, name);
        let status = retry(retry_policy, "storage.copy", || {
            self.store.copy(container, &name, location)
        })
        .await?;

        if status == CopyStatus::Pending {
            let store = &self.store;
            let name = name.as_str();
            let settled = poll_until_terminal(
                "storage.copy_status",
                &self.copy_policy,
                retry_policy,
                None,
                || async move {
                    let status = store.copy_status(container, name).await?;
                    Ok(JobSnapshot::new(
                        status.as_job_status(),
                        serde_json::json!({ "copyStatus": status }),
                    ))
                },
            )
            .await?;
            if settled.status != JobStatus::Succeeded {
                return Err(PipelineError::Storage(format!(
                    "copy to {}/{} ended {}",
                    container, name, settled.status
                )));
            }
        } else if status != CopyStatus::Success {
            return Err(PipelineError::Storage(format!(
                "copy to {}/{} ended {:?}",
                container, name, status
            )));
        }

        retry(retry_policy, "storage.delete", || {
            self.store.delete(container, nested)
        })
        .await?;
        info!("Deleted nested artifact {}", nested);

        Ok(format!("{}/{}", container, name))
    }
}
