//! Event Grid blob notifications.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::FileDescriptor;

pub const SUBSCRIPTION_VALIDATION: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";
pub const BLOB_CREATED: &str = "Microsoft.Storage.BlobCreated";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGridEvent {
    #[serde(default)]
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub data: Value,
}

/// What a delivered batch asks of us.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBatch {
    /// Subscription handshake: echo the code back.
    Validation { code: String },
    /// New blobs in the watched container.
    Blobs(Vec<FileDescriptor>),
}

/// Split a subject like `/blobServices/default/containers/bronze/blobs/a/b.wav`
/// into container and blob name.
pub fn parse_subject(subject: &str) -> Option<(&str, &str)> {
    let rest = subject.split_once("/containers/")?.1;
    let (container, name) = rest.split_once("/blobs/")?;
    if container.is_empty() || name.is_empty() {
        return None;
    }
    Some((container, name))
}

/// Interpret a batch, keeping only blobs created in `source_container`.
pub fn parse_events(events: &[EventGridEvent], source_container: &str) -> EventBatch {
    if let Some(code) = events
        .iter()
        .filter(|e| e.event_type == SUBSCRIPTION_VALIDATION)
        .find_map(|e| e.data.get("validationCode").and_then(|c| c.as_str()))
    {
        return EventBatch::Validation {
            code: code.to_string(),
        };
    }

    let blobs = events
        .iter()
        .filter(|e| e.event_type == BLOB_CREATED)
        .filter_map(|e| {
            let Some((container, name)) = parse_subject(&e.subject) else {
                debug!("Ignoring event {} with subject {}", e.id, e.subject);
                return None;
            };
            if container != source_container {
                debug!("Ignoring blob {} in container {}", name, container);
                return None;
            }
            let uri = e
                .data
                .get("url")
                .and_then(|u| u.as_str())
                .unwrap_or_default();
            Some(FileDescriptor::new(name, container, uri))
        })
        .collect();
    EventBatch::Blobs(blobs)
}
