//! Enrichment: derive a summary from extracted text.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::LlmClient;

/// A model that turns extracted text into enriched text.
#[async_trait]
pub trait EnrichmentAdapter: Send + Sync {
    /// `correlation_id` ties the call to the orchestration instance.
    async fn enrich(&self, text: &str, correlation_id: &str) -> Result<String>;
}

/// Enrichment through a chat-completion model.
pub struct LlmEnricher {
    llm: LlmClient,
}

impl LlmEnricher {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl EnrichmentAdapter for LlmEnricher {
    async fn enrich(&self, text: &str, correlation_id: &str) -> Result<String> {
        self.llm.summarize(text, correlation_id).await
    }
}
