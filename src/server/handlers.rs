//! HTTP request handlers for the trigger API.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::trigger::{parse_events, EventBatch, EventGridEvent};

/// Body of a start request. `uri` is derived from storage settings when absent.
#[derive(Debug, Deserialize)]
struct StartRequest {
    name: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

fn invalid_json() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid JSON.").into_response()
}

/// Scheme and authority the caller used, for absolute status URLs.
/// A TLS-terminating proxy reports the scheme in `X-Forwarded-Proto`.
fn base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("{}://{}", scheme, host))
        .unwrap_or_default()
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Start an orchestration for one blob and return a status handle.
pub async fn start_orchestration(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: StartRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected start request: {}", e);
            return invalid_json();
        }
    };
    let Some(name) = request.name.filter(|n| !n.trim().is_empty()) else {
        return invalid_json();
    };

    let file = state.launcher.descriptor(&name, request.uri.as_deref());
    let id = state.launcher.start(file).await;
    let status_uri = format!("{}/api/instances/{}", base_url(&headers), id);

    (
        StatusCode::ACCEPTED,
        [(header::LOCATION, status_uri.clone())],
        Json(json!({
            "id": id,
            "statusQueryGetUri": status_uri,
        })),
    )
        .into_response()
}

/// Instance status: 202 while running, 200 once terminal.
pub async fn instance_status(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Response {
    match state.launcher.instances().get(&instance_id).await {
        Some(record) => {
            let status = if record.runtime_status.is_terminal() {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            (status, Json(record)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Instance not found" })),
        )
            .into_response(),
    }
}

/// Event Grid webhook for blob-created notifications.
pub async fn blob_events(State(state): State<AppState>, body: Bytes) -> Response {
    let events: Vec<EventGridEvent> = match serde_json::from_slice(&body) {
        Ok(events) => events,
        Err(_) => return invalid_json(),
    };

    match parse_events(&events, &state.launcher.storage().source_container) {
        EventBatch::Validation { code } => {
            Json(json!({ "validationResponse": code })).into_response()
        }
        EventBatch::Blobs(files) => {
            let mut started = Vec::with_capacity(files.len());
            for file in files {
                started.push(state.launcher.start(file).await);
            }
            let status = if started.is_empty() {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            (status, Json(json!({ "started": started }))).into_response()
        }
    }
}
