//! Orchestration core: route a file, extract, enrich, persist.
//!
//! Each call to [`Orchestrator::process`] is one isolated instance. Steps run
//! strictly in sequence; a fatal failure in any step ends the instance and is
//! recorded on the outcome rather than returned as an error.

mod route;

pub use route::{select_route, Route};

use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};

use crate::config::{FeatureToggles, Settings};
use crate::enrichment::{EnrichmentAdapter, LlmEnricher};
use crate::error::{PipelineError, Result};
use crate::extraction::{
    run_extraction, DocumentAdapter, ExtractionKind, ExtractionResult, ExtractorRegistry,
    MultimodalAdapter, SpeechAdapter, VisionAdapter,
};
use crate::http_client::ApiClient;
use crate::llm::LlmClient;
use crate::models::{FileDescriptor, OrchestrationOutcome};
use crate::retry::{retry, RetryPolicy, ShutdownSignal};
use crate::storage::{
    store_from_settings, ArtifactRelocator, EnrichmentRecord, ResultSink, ResultWriter,
};

pub struct Orchestrator {
    toggles: FeatureToggles,
    retry_policy: RetryPolicy,
    extractors: ExtractorRegistry,
    enricher: Arc<dyn EnrichmentAdapter>,
    sink: Arc<dyn ResultSink>,
    relocator: Option<ArtifactRelocator>,
    shutdown: Option<ShutdownSignal>,
}

impl Orchestrator {
    pub fn new(
        toggles: FeatureToggles,
        retry_policy: RetryPolicy,
        extractors: ExtractorRegistry,
        enricher: Arc<dyn EnrichmentAdapter>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            toggles,
            retry_policy,
            extractors,
            enricher,
            sink,
            relocator: None,
            shutdown: None,
        }
    }

    /// Where redacted artifacts get moved once extraction produces them.
    pub fn with_relocator(mut self, relocator: ArtifactRelocator) -> Self {
        self.relocator = Some(relocator);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Wire every adapter from the settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = ApiClient::new(settings.http_timeout())?;
        let llm = LlmClient::new(settings.llm.clone(), http.clone(), settings.access_token());

        let mut extractors = ExtractorRegistry::new()
            .with(Arc::new(SpeechAdapter::new(settings, http.clone())))
            .with(Arc::new(DocumentAdapter::new(settings, http.clone())));
        if settings.features.multimodal {
            extractors.register(Arc::new(MultimodalAdapter::new(llm.clone())));
        }
        if settings.features.vision {
            extractors.register(Arc::new(VisionAdapter::new(settings, http.clone())));
        }

        let store = store_from_settings(settings, http)?;
        let sink = ResultWriter::new(store.clone(), &settings.storage.final_output_container);
        let relocator = ArtifactRelocator::new(
            store,
            &settings.storage.target_container,
            settings.poll_ceiling(),
        );

        Ok(Self::new(
            settings.features,
            settings.pipeline.retry.clone(),
            extractors,
            Arc::new(LlmEnricher::new(llm)),
            Arc::new(sink),
        )
        .with_relocator(relocator))
    }

    /// Run one instance to its terminal outcome.
    pub async fn process(&self, file: FileDescriptor, instance_id: &str) -> OrchestrationOutcome {
        let span = info_span!("orchestration", instance = %instance_id, file = %file.name);
        self.run(file, instance_id).instrument(span).await
    }

    async fn run(&self, file: FileDescriptor, instance_id: &str) -> OrchestrationOutcome {
        let mut outcome = OrchestrationOutcome::begin(instance_id, file.clone());

        let kind = match select_route(&file, self.toggles) {
            Route::Skip(reason) => {
                info!("Skipping {}: {}", file.name, reason);
                return outcome.skipped(reason);
            }
            Route::Extract(kind) => kind,
        };
        outcome.route = Some(kind);
        info!("Routing {} to {} extraction", file.name, kind);

        let extraction = match self.extract(kind, &file, instance_id).await {
            Ok(extraction) => extraction,
            Err(e) => return fail(outcome, "extract", e),
        };

        let text = match extraction {
            ExtractionResult::Text { text } => text,
            ExtractionResult::Artifact { location } => {
                // Redacted documents are the product; there is no text to enrich.
                let location = match &self.relocator {
                    Some(relocator) => {
                        match relocator.relocate(&file, &location, &self.retry_policy).await {
                            Ok(moved) => moved,
                            Err(e) => return fail(outcome, "relocate", e),
                        }
                    }
                    None => location,
                };
                outcome.persisted_location = Some(location);
                return outcome.completed();
            }
        };
        outcome.extracted_text = Some(text.clone());

        let enriched = match retry(&self.retry_policy, "enrich", || {
            self.enricher.enrich(&text, instance_id)
        })
        .await
        {
            Ok(enriched) => enriched,
            Err(e) => return fail(outcome, "enrich", e),
        };
        outcome.enriched_text = Some(enriched.clone());

        let record = EnrichmentRecord::new(&file, instance_id, kind, enriched);
        match retry(&self.retry_policy, "persist", || {
            self.sink.persist(&file, &record)
        })
        .await
        {
            Ok(location) => {
                info!("Completed {} -> {}", file.name, location);
                outcome.persisted_location = Some(location);
                outcome.completed()
            }
            Err(e) => fail(outcome, "persist", e),
        }
    }

    async fn extract(
        &self,
        kind: ExtractionKind,
        file: &FileDescriptor,
        instance_id: &str,
    ) -> Result<ExtractionResult> {
        let adapter = self.extractors.get(kind).ok_or_else(|| {
            PipelineError::Config(format!("no {} extraction adapter is configured", kind))
        })?;
        run_extraction(
            adapter.as_ref(),
            file,
            instance_id,
            &self.retry_policy,
            self.shutdown.clone(),
        )
        .await
    }
}

fn fail(outcome: OrchestrationOutcome, step: &str, err: PipelineError) -> OrchestrationOutcome {
    error!("Step {} failed for {}: {}", step, outcome.file.name, err);
    outcome.failed(step, &err)
}
