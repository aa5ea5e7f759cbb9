//! LLM client configuration.

use serde::{Deserialize, Serialize};

use super::prompts::{DEFAULT_MULTIMODAL_PROMPT, DEFAULT_SUMMARY_PROMPT};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Azure OpenAI deployment (default)
    #[default]
    Azure,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    OpenAI,
    /// Ollama API (local)
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "azure" | "aoai" | "azure-openai" => Some(Self::Azure),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Configuration for LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Base URL of the resource or API host
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name, or deployment name for Azure
    #[serde(default = "default_model")]
    pub model: String,
    /// Azure `api-version` query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Custom enrichment prompt (uses the {content} placeholder)
    #[serde(default)]
    pub summary_prompt: Option<String>,
    /// Custom prompt for multimodal extraction
    #[serde(default)]
    pub multimodal_prompt: Option<String>,
    /// Maximum characters of extracted text to send
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_endpoint() -> String {
    String::new()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_version() -> String {
    "2024-10-21".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_content_chars() -> usize {
    48000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            summary_prompt: None,
            multimodal_prompt: None,
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "azure" (default), "openai", "groq", "together" or "ollama"
    /// - `LLM_ENDPOINT` / `AOAI_ENDPOINT`: API endpoint
    /// - `LLM_API_KEY` / `AOAI_API_KEY`: API key
    /// - `LLM_MODEL` / `AOAI_DEPLOYMENT`: model or deployment name
    /// - `LLM_API_VERSION`: Azure api-version
    /// - `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`, `LLM_MAX_CONTENT_CHARS`
    /// - `LLM_SUMMARY_PROMPT`, `LLM_MULTIMODAL_PROMPT`
    ///
    /// The `LLM_*` name wins when both it and the `AOAI_*` alias are set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(provider) = std::env::var("LLM_PROVIDER")
            .ok()
            .and_then(|v| LlmProvider::from_str(&v))
        {
            self.provider = provider;
        }
        if let Some(endpoint) = first_env(&["LLM_ENDPOINT", "AOAI_ENDPOINT"]) {
            self.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(key) = first_env(&["LLM_API_KEY", "AOAI_API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Some(model) = first_env(&["LLM_MODEL", "AOAI_DEPLOYMENT"]) {
            self.model = model;
        }
        if let Ok(val) = std::env::var("LLM_API_VERSION") {
            self.api_version = val;
        }
        if let Ok(val) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = val.parse() {
                self.max_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(t) = val.parse() {
                self.temperature = t;
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_CONTENT_CHARS") {
            if let Ok(n) = val.parse() {
                self.max_content_chars = n;
            }
        }
        if let Ok(val) = std::env::var("LLM_SUMMARY_PROMPT") {
            self.summary_prompt = Some(val);
        }
        if let Ok(val) = std::env::var("LLM_MULTIMODAL_PROMPT") {
            self.multimodal_prompt = Some(val);
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Get the enrichment prompt, using custom or default.
    pub fn get_summary_prompt(&self) -> &str {
        self.summary_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SUMMARY_PROMPT)
    }

    /// Get the multimodal prompt, using custom or default.
    pub fn get_multimodal_prompt(&self) -> &str {
        self.multimodal_prompt
            .as_deref()
            .unwrap_or(DEFAULT_MULTIMODAL_PROMPT)
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}
