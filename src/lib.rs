//! blobflow - blob-triggered document and media ingestion.
//!
//! A file landing in the source container is routed by extension to an
//! extraction service (speech, document, multimodal or vision), the text is
//! enriched by an LLM, and the result is persisted to the output container.

pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod extraction;
pub mod http_client;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod server;
pub mod storage;
pub mod trigger;

pub use config::Settings;
pub use error::{PipelineError, Result};
pub use orchestrator::Orchestrator;
