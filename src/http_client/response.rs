//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{PipelineError, Result};

/// Fully-read response from an external service.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub operation: String,
    pub status: StatusCode,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Get a header that must be present.
    pub fn require_header(&self, name: &str) -> Result<&str> {
        self.header(name).ok_or_else(|| {
            PipelineError::protocol(&self.operation, format!("missing {} header", name))
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| PipelineError::protocol(&self.operation, format!("invalid JSON: {}", e)))
    }
}

/// Whether a status code is worth retrying (408, 429 and 5xx).
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Parse a `Retry-After` value given in seconds, capped at one minute.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<std::time::Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| std::time::Duration::from_secs(secs.min(60)))
}
