//! Configuration management for blobflow.
//!
//! Settings are built once at startup from defaults, an optional TOML file
//! and environment overrides, then shared by reference with the
//! orchestration core and every adapter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::retry::{PollPolicy, RetryPolicy};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "blobflow.toml";

/// Where persisted blobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory tree on the local filesystem (development).
    #[default]
    Local,
    /// Azure Blob Storage REST API.
    Azure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// e.g. `https://account.blob.core.windows.net`
    #[serde(default)]
    pub account_url: Option<String>,
    /// Root directory for the local backend; containers are subdirectories.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    #[serde(default = "default_source_container")]
    pub source_container: String,
    /// Container receiving redacted documents.
    #[serde(default = "default_target_container")]
    pub target_container: String,
    /// Container receiving enrichment results.
    #[serde(default = "default_final_output_container")]
    pub final_output_container: String,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_source_container() -> String {
    "bronze".to_string()
}

fn default_target_container() -> String {
    "silver".to_string()
}

fn default_final_output_container() -> String {
    "final".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            account_url: None,
            local_root: default_local_root(),
            source_container: default_source_container(),
            target_container: default_target_container(),
            final_output_container: default_final_output_container(),
        }
    }
}

impl StorageConfig {
    /// Public URI of a blob, used when a trigger does not supply one.
    pub fn blob_uri(&self, container: &str, name: &str) -> String {
        match &self.account_url {
            Some(base) => format!("{}/{}/{}", base.trim_end_matches('/'), container, name),
            None => self
                .local_root
                .join(container)
                .join(name)
                .to_string_lossy()
                .into_owned(),
        }
    }

    pub fn container_url(&self, container: &str) -> Option<String> {
        self.account_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), container))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// AI Services endpoint hosting the batch transcription API.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_speech_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_speech_poll_interval() -> u64 {
    10
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            locale: default_locale(),
            poll_interval_secs: default_speech_poll_interval(),
        }
    }
}

/// What the document path does with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    /// Read the document's text with Document Intelligence.
    #[default]
    Extract,
    /// Produce a PII-redacted copy with the Language service.
    Redact,
}

impl DocumentMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "extract" | "docintel" => Some(Self::Extract),
            "redact" | "pii" => Some(Self::Redact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default)]
    pub mode: DocumentMode,
    /// Document Intelligence endpoint (extract mode).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_document_model")]
    pub model_id: String,
    /// Language service endpoint (redact mode).
    #[serde(default)]
    pub language_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_api_key: Option<String>,
    #[serde(default = "default_locale")]
    pub language: String,
    #[serde(default = "default_document_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_document_model() -> String {
    "prebuilt-read".to_string()
}

fn default_document_poll_interval() -> u64 {
    2
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            mode: DocumentMode::default(),
            endpoint: None,
            api_key: None,
            model_id: default_document_model(),
            language_endpoint: None,
            language_api_key: None,
            language: default_locale(),
            poll_interval_secs: default_document_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Turns on `features.vision` when the settings are loaded.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Which extraction paths are switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    /// Read documents with a multimodal LLM instead of Document Intelligence.
    #[serde(default)]
    pub multimodal: bool,
    /// Analyze images with the vision service.
    #[serde(default)]
    pub vision: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Ceiling applied to every polling loop.
    #[serde(default = "default_poll_ceiling")]
    pub poll_ceiling_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Interval of the local directory watcher.
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
    /// Finished instances kept for status queries.
    #[serde(default = "default_retained_instances")]
    pub retained_instances: usize,
}

fn default_poll_ceiling() -> u64 {
    900
}

fn default_http_timeout() -> u64 {
    30
}

fn default_watch_interval() -> u64 {
    5
}

fn default_retained_instances() -> usize {
    crate::trigger::DEFAULT_RETAINED_INSTANCES
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_ceiling_secs: default_poll_ceiling(),
            http_timeout_secs: default_http_timeout(),
            watch_interval_secs: default_watch_interval(),
            retained_instances: default_retained_instances(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub features: FeatureToggles,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Bearer token used when a service has no API key configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file (if any) and apply env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        Ok(settings.with_section_toggles())
    }

    /// Fold section-level switches into the feature toggles.
    fn with_section_toggles(mut self) -> Self {
        if self.vision.enabled {
            self.features.vision = true;
        }
        self
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("STORAGE_BACKEND") {
            match val.to_lowercase().as_str() {
                "azure" => self.storage.backend = StorageBackend::Azure,
                "local" => self.storage.backend = StorageBackend::Local,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("STORAGE_ACCOUNT_URL") {
            self.storage.account_url = Some(val.trim_end_matches('/').to_string());
        }
        if let Ok(val) = std::env::var("STORAGE_LOCAL_ROOT") {
            self.storage.local_root = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SOURCE_CONTAINER") {
            self.storage.source_container = val;
        }
        if let Ok(val) = std::env::var("TARGET_CONTAINER") {
            self.storage.target_container = val;
        }
        if let Ok(val) = std::env::var("FINAL_OUTPUT_CONTAINER") {
            self.storage.final_output_container = val;
        }

        if let Ok(val) = std::env::var("AI_SERVICES_ENDPOINT") {
            self.speech.endpoint = Some(val.trim_end_matches('/').to_string());
        }
        if let Ok(val) = std::env::var("SPEECH_API_KEY") {
            self.speech.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("SPEECH_LOCALE") {
            self.speech.locale = val;
        }
        if let Some(secs) = env_parse("SPEECH_POLL_INTERVAL_SECS") {
            self.speech.poll_interval_secs = secs;
        }

        if let Some(mode) = std::env::var("DOCUMENT_MODE")
            .ok()
            .and_then(|v| DocumentMode::from_str(&v))
        {
            self.document.mode = mode;
        }
        if let Ok(val) = std::env::var("DOCUMENT_ENDPOINT") {
            self.document.endpoint = Some(val.trim_end_matches('/').to_string());
        }
        if let Ok(val) = std::env::var("DOCUMENT_API_KEY") {
            self.document.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("LANGUAGE_ENDPOINT") {
            self.document.language_endpoint = Some(val.trim_end_matches('/').to_string());
        }
        if let Ok(val) = std::env::var("LANGUAGE_API_KEY") {
            self.document.language_api_key = Some(val);
        }
        if let Some(secs) = env_parse("DOCUMENT_POLL_INTERVAL_SECS") {
            self.document.poll_interval_secs = secs;
        }

        if let Ok(val) = std::env::var("VISION_ENDPOINT") {
            self.vision.endpoint = Some(val.trim_end_matches('/').to_string());
        }
        if let Ok(val) = std::env::var("VISION_API_KEY") {
            self.vision.api_key = Some(val);
        }
        if let Some(flag) = env_flag("AI_VISION_ENABLED") {
            self.features.vision = flag;
        }
        if let Some(flag) = env_flag("AOAI_MULTI_MODAL") {
            self.features.multimodal = flag;
        }

        if let Some(n) = env_parse("RETRY_MAX_ATTEMPTS") {
            self.pipeline.retry.max_attempts = n;
        }
        if let Some(ms) = env_parse("RETRY_INITIAL_BACKOFF_MS") {
            self.pipeline.retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse("POLL_CEILING_SECS") {
            self.pipeline.poll_ceiling_secs = secs;
        }
        if let Ok(val) = std::env::var("AZURE_ACCESS_TOKEN") {
            self.access_token = Some(val);
        }

        self.llm = self.llm.with_env_overrides();
        self
    }

    pub fn poll_ceiling(&self) -> Duration {
        Duration::from_secs(self.pipeline.poll_ceiling_secs)
    }

    pub fn speech_poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.speech.poll_interval_secs),
            self.poll_ceiling(),
        )
    }

    pub fn document_poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.document.poll_interval_secs),
            self.poll_ceiling(),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.http_timeout_secs)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

/// Parse a feature toggle: "true" (any case) or "1" is on, anything else off.
pub fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| parse_flag(&v))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
