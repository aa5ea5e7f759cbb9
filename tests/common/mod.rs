//! Recording test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use blobflow::config::FeatureToggles;
use blobflow::enrichment::EnrichmentAdapter;
use blobflow::error::{PipelineError, Result};
use blobflow::extraction::{ExtractionAdapter, ExtractionKind, ExtractionResult, ExtractorRegistry};
use blobflow::models::{FileDescriptor, JobHandle, JobSnapshot, JobStatus};
use blobflow::orchestrator::Orchestrator;
use blobflow::retry::{PollPolicy, RetryPolicy};
use blobflow::storage::{BlobStore, CopyStatus, ResultWriter};

/// Extraction service double with scripted statuses and failures.
pub struct RecordingExtractor {
    kind: ExtractionKind,
    pub result: ExtractionResult,
    /// Status returned by each successive poll; the last one repeats.
    pub statuses: Vec<JobStatus>,
    pub transient_submit_failures: u32,
    pub poll_policy: PollPolicy,
    pub submits: AtomicU32,
    pub polls: AtomicU32,
    pub fetches: AtomicU32,
}

impl RecordingExtractor {
    pub fn new(kind: ExtractionKind, text: &str) -> Self {
        Self {
            kind,
            result: ExtractionResult::text(text),
            statuses: vec![JobStatus::Running, JobStatus::Succeeded],
            transient_submit_failures: 0,
            poll_policy: PollPolicy::new(Duration::from_secs(10), Duration::from_secs(300)),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
            + self.polls.load(Ordering::SeqCst)
            + self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionAdapter for RecordingExtractor {
    fn kind(&self) -> ExtractionKind {
        self.kind
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll_policy.clone()
    }

    async fn submit(&self, _file: &FileDescriptor, _instance_id: &str) -> Result<JobHandle> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        if n < self.transient_submit_failures {
            return Err(PipelineError::transient(
                format!("{}.submit", self.kind),
                "HTTP 503",
            ));
        }
        Ok(JobHandle::remote(format!("https://svc.example/{}/jobs/1", self.kind)))
    }

    async fn poll(&self, _location: &str) -> Result<JobSnapshot> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) as usize;
        let status = self.statuses[n.min(self.statuses.len() - 1)];
        Ok(JobSnapshot::new(
            status,
            json!({
                "status": status.as_str(),
                "error": {"code": "InvalidData", "message": "Audio could not be decoded"}
            }),
        ))
    }

    async fn fetch_result(
        &self,
        _file: &FileDescriptor,
        _snapshot: &JobSnapshot,
    ) -> Result<ExtractionResult> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Enrichment double that records every call.
pub struct RecordingEnricher {
    pub reply: String,
    /// Transient failures before the first success; `u32::MAX` never succeeds.
    pub transient_failures: u32,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl RecordingEnricher {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            transient_failures: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reply: &str, transient_failures: u32) -> Self {
        Self {
            transient_failures,
            ..Self::new(reply)
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.lock().unwrap().len() as u32
    }
}

#[async_trait]
impl EnrichmentAdapter for RecordingEnricher {
    async fn enrich(&self, text: &str, correlation_id: &str) -> Result<String> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((text.to_string(), correlation_id.to_string()));
            calls.len() as u32
        };
        if n <= self.transient_failures {
            return Err(PipelineError::Transient {
                operation: "enrich".into(),
                message: "HTTP 429".into(),
                retry_after: None,
            });
        }
        Ok(self.reply.clone())
    }
}

/// In-memory blob store; locations look like `mem://<container>/<name>`.
#[derive(Default)]
pub struct MemoryStore {
    pub blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub writes: AtomicU32,
}

impl MemoryStore {
    pub fn get(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    pub fn put(&self, container: &str, name: &str, data: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert((container.to_string(), name.to_string()), data.to_vec());
    }

    pub fn names(&self, container: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .blobs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn write(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.put(container, name, &data);
        Ok(())
    }

    async fn copy(&self, container: &str, name: &str, source_url: &str) -> Result<CopyStatus> {
        let (source_container, source_name) = source_url
            .strip_prefix("mem://")
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| PipelineError::Storage(format!("bad source {}", source_url)))?;
        let data = self
            .get(source_container, source_name)
            .ok_or_else(|| PipelineError::Storage(format!("missing {}", source_url)))?;
        self.put(container, name, &data);
        Ok(CopyStatus::Pending)
    }

    async fn copy_status(&self, container: &str, name: &str) -> Result<CopyStatus> {
        match self.get(container, name) {
            Some(_) => Ok(CopyStatus::Success),
            None => Err(PipelineError::Storage(format!("missing {}/{}", container, name))),
        }
    }

    async fn delete(&self, container: &str, name: &str) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .remove(&(container.to_string(), name.to_string()));
        Ok(())
    }

    fn container_url(&self, container: &str) -> String {
        format!("mem://{}", container)
    }
}

/// Everything a scenario needs to inspect after running.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryStore>,
    pub enricher: Arc<RecordingEnricher>,
}

pub fn harness(
    toggles: FeatureToggles,
    extractors: Vec<Arc<RecordingExtractor>>,
    enricher: RecordingEnricher,
) -> Harness {
    let mut registry = ExtractorRegistry::new();
    for extractor in extractors {
        registry.register(extractor);
    }
    let store = Arc::new(MemoryStore::default());
    let enricher = Arc::new(enricher);
    let orchestrator = Orchestrator::new(
        toggles,
        RetryPolicy::default(),
        registry,
        enricher.clone(),
        Arc::new(ResultWriter::new(store.clone(), "final")),
    );
    Harness {
        orchestrator,
        store,
        enricher,
    }
}

pub fn descriptor(name: &str) -> FileDescriptor {
    FileDescriptor::new(
        name,
        "bronze",
        format!("https://acct.blob.core.windows.net/bronze/{}", name),
    )
}
