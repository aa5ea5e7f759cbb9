//! HTTP client for the extraction, enrichment and storage services.
//!
//! Wraps `reqwest` so every adapter gets the same credential handling,
//! timeouts and failure classification: connection errors, timeouts and
//! 408/429/5xx responses become [`PipelineError::Transient`]; any other
//! non-2xx status becomes [`PipelineError::Http`].

mod response;

pub use response::{is_transient_status, parse_retry_after, ApiResponse};

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a request authenticates with a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// A service-specific key header, e.g. `Ocp-Apim-Subscription-Key`.
    ApiKey { header: String, key: String },
}

impl Credential {
    /// Pick an API key when present, otherwise fall back to a bearer token.
    pub fn resolve(header: &str, api_key: Option<&str>, bearer: Option<&str>) -> Self {
        match (api_key, bearer) {
            (Some(key), _) if !key.is_empty() => Self::ApiKey {
                header: header.to_string(),
                key: key.to_string(),
            },
            (_, Some(token)) if !token.is_empty() => Self::Bearer {
                token: token.to_string(),
            },
            _ => Self::None,
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::Bearer { token } => request.bearer_auth(token),
            Self::ApiKey { header, key } => request.header(header.as_str(), key.as_str()),
        }
    }
}

/// Shared HTTP client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

fn extract_response_headers(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blobflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Start a request with credentials applied.
    pub fn request(&self, method: Method, url: &str, credential: &Credential) -> RequestBuilder {
        credential.apply(self.client.request(method, url))
    }

    pub async fn get(
        &self,
        operation: &str,
        url: &str,
        credential: &Credential,
    ) -> Result<ApiResponse> {
        self.send(operation, self.request(Method::GET, url, credential))
            .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        operation: &str,
        url: &str,
        credential: &Credential,
        body: &T,
    ) -> Result<ApiResponse> {
        self.send(operation, self.request(Method::POST, url, credential).json(body))
            .await
    }

    /// Send a request and classify the result.
    pub async fn send(&self, operation: &str, request: RequestBuilder) -> Result<ApiResponse> {
        let response = request.send().await.map_err(|e| classify_send_error(operation, e))?;
        let status = response.status();
        let headers = extract_response_headers(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::transient(operation, format!("reading body: {}", e)))?
            .to_vec();

        debug!("{}: HTTP {}", operation, status);

        let response = ApiResponse {
            operation: operation.to_string(),
            status,
            headers,
            body,
        };

        if response.is_success() {
            Ok(response)
        } else if is_transient_status(status) {
            Err(PipelineError::Transient {
                operation: operation.to_string(),
                message: format!("HTTP {}: {}", status, response.text()),
                retry_after: parse_retry_after(response.header("retry-after")),
            })
        } else {
            Err(PipelineError::Http {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: response.text(),
            })
        }
    }
}

fn classify_send_error(operation: &str, err: reqwest::Error) -> PipelineError {
    if err.is_builder() {
        PipelineError::Config(format!("{}: invalid request: {}", operation, err))
    } else {
        PipelineError::transient(operation, err.to_string())
    }
}
