//! LLM client for enrichment and multimodal extraction.
//!
//! Supports Azure OpenAI deployments, OpenAI-compatible chat APIs and Ollama.

mod config;
mod prompts;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use config::{LlmConfig, LlmProvider};
pub use prompts::DEFAULT_SYSTEM_PROMPT;

use crate::error::{PipelineError, Result};
use crate::http_client::{ApiClient, Credential};

/// Header carrying the orchestration instance id on every request.
const CORRELATION_HEADER: &str = "x-ms-client-request-id";

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// LLM client for enrichment and multimodal calls.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http: ApiClient,
    credential: Credential,
}

impl LlmClient {
    pub fn new(config: LlmConfig, http: ApiClient, bearer: Option<&str>) -> Self {
        let credential = match (&config.provider, config.api_key.as_deref()) {
            (LlmProvider::Azure, key) => Credential::resolve("api-key", key, bearer),
            (_, Some(key)) if !key.is_empty() => Credential::Bearer {
                token: key.to_string(),
            },
            _ => Credential::None,
        };
        Self {
            config,
            http,
            credential,
        }
    }

    /// Summarize extracted text. `correlation_id` is sent with the request.
    pub async fn summarize(&self, text: &str, correlation_id: &str) -> Result<String> {
        let prompt = self
            .config
            .get_summary_prompt()
            .replace("{content}", self.truncate_content(text));

        debug!("Requesting enrichment for instance {}", correlation_id);
        let messages = [
            ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        self.complete(&messages, correlation_id).await
    }

    /// Ask a vision-capable model to read the file at `uri`.
    pub async fn read_file(&self, uri: &str, correlation_id: &str) -> Result<String> {
        if self.config.provider == LlmProvider::Ollama {
            return Err(PipelineError::Config(
                "multimodal extraction needs an Azure or OpenAI-compatible provider".to_string(),
            ));
        }
        let messages = [ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: self.config.get_multimodal_prompt().to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: uri.to_string(),
                },
            },
        ])];
        self.complete(&messages, correlation_id).await
    }

    /// Run one completion and return the trimmed text.
    pub async fn complete(&self, messages: &[ChatMessage], correlation_id: &str) -> Result<String> {
        if self.config.endpoint.trim().is_empty() {
            return Err(PipelineError::Config("LLM_ENDPOINT is not configured".to_string()));
        }
        let text = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(messages, correlation_id).await?,
            LlmProvider::Azure | LlmProvider::OpenAI => {
                self.call_chat(messages, correlation_id).await?
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::protocol("llm.complete", "empty completion"));
        }
        Ok(text)
    }

    fn chat_url(&self) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        match self.config.provider {
            LlmProvider::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, self.config.model, self.config.api_version
            ),
            _ => format!("{}/v1/chat/completions", endpoint),
        }
    }

    async fn call_chat(&self, messages: &[ChatMessage], correlation_id: &str) -> Result<String> {
        let request = ChatRequest {
            model: match self.config.provider {
                LlmProvider::Azure => None,
                _ => Some(self.config.model.as_str()),
            },
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            user: correlation_id,
        };

        let builder = self
            .http
            .request(reqwest::Method::POST, &self.chat_url(), &self.credential)
            .header(CORRELATION_HEADER, correlation_id)
            .json(&request);
        let response: ChatResponse = self.http.send("llm.chat", builder).await?.json()?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::protocol("llm.chat", "no choices in response"))
    }

    async fn call_ollama(&self, messages: &[ChatMessage], correlation_id: &str) -> Result<String> {
        let prompt = messages
            .iter()
            .filter_map(|m| match &m.content {
                MessageContent::Text(text) => Some(text.as_str()),
                MessageContent::Parts(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let builder = self
            .http
            .request(reqwest::Method::POST, &url, &self.credential)
            .header(CORRELATION_HEADER, correlation_id)
            .json(&request);
        let response: OllamaResponse = self.http.send("llm.ollama", builder).await?.json()?;
        Ok(response.response)
    }

    /// Truncate content to configured maximum (UTF-8 safe).
    fn truncate_content<'a>(&self, text: &'a str) -> &'a str {
        if text.len() <= self.config.max_content_chars {
            return text;
        }
        let mut end = self.config.max_content_chars;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::DEFAULT_TIMEOUT;

    fn client(config: LlmConfig) -> LlmClient {
        LlmClient::new(config, ApiClient::new(DEFAULT_TIMEOUT).unwrap(), None)
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let config = LlmConfig {
            max_content_chars: 4,
            ..LlmConfig::default()
        };
        let client = client(config);
        assert_eq!(client.truncate_content("héllo"), "hél");
        assert_eq!(client.truncate_content("hi"), "hi");
    }

    #[test]
    fn test_chat_urls() {
        let azure = client(LlmConfig {
            endpoint: "https://aoai.example/".into(),
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        });
        assert_eq!(
            azure.chat_url(),
            "https://aoai.example/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-10-21"
        );

        let openai = client(
            LlmConfig::default()
                .with_provider(LlmProvider::OpenAI)
                .with_endpoint("https://api.openai.com"),
        );
        assert_eq!(openai.chat_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_multimodal_message_shape() {
        let msg = ChatMessage::user_parts(vec![
            ContentPart::Text { text: "read".into() },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://acct/bronze/a.png".into(),
                },
            },
        ]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "https://acct/bronze/a.png");
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::Azure);
        assert!(config.summary_prompt.is_none());
        assert!(config.get_summary_prompt().contains("{content}"));
    }
}
