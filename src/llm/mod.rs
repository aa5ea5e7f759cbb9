//! Language-model client used for enrichment and multimodal extraction.

mod client;

pub use client::{ChatMessage, ContentPart, ImageUrl, LlmClient, LlmConfig, LlmProvider, MessageContent};
