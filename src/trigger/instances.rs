//! In-memory record of orchestration instances started by the triggers.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::{FileDescriptor, OrchestrationOutcome, OutcomeStatus};

/// Name reported for every instance.
pub const ORCHESTRATION_NAME: &str = "process_blob";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RuntimeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A skipped file is a normal end state, so it reports `Completed`.
    pub fn from_outcome(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Completed | OutcomeStatus::Skipped => Self::Completed,
            OutcomeStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: String,
    pub name: String,
    pub runtime_status: RuntimeStatus,
    pub input: FileDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OrchestrationOutcome>,
    pub created_time: DateTime<Utc>,
    pub last_updated_time: DateTime<Utc>,
}

/// Finished records kept before the oldest are dropped.
pub const DEFAULT_RETAINED_INSTANCES: usize = 1000;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, InstanceRecord>,
    /// Terminal instance ids, oldest first.
    finished: VecDeque<String>,
}

/// Pending and running instances are always kept; terminal ones are
/// evicted oldest-first once more than `capacity` have finished.
#[derive(Debug)]
pub struct InstanceRegistry {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RETAINED_INSTANCES)
    }
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity,
        }
    }

    pub async fn register(&self, instance_id: &str, input: FileDescriptor) {
        let now = Utc::now();
        let record = InstanceRecord {
            instance_id: instance_id.to_string(),
            name: ORCHESTRATION_NAME.to_string(),
            runtime_status: RuntimeStatus::Pending,
            input,
            output: None,
            created_time: now,
            last_updated_time: now,
        };
        let mut inner = self.inner.write().await;
        if inner.records.insert(instance_id.to_string(), record).is_some() {
            inner.finished.retain(|id| id != instance_id);
        }
    }

    pub async fn mark_running(&self, instance_id: &str) {
        if let Some(record) = self.inner.write().await.records.get_mut(instance_id) {
            record.runtime_status = RuntimeStatus::Running;
            record.last_updated_time = Utc::now();
        }
    }

    pub async fn finish(&self, outcome: OrchestrationOutcome) {
        let mut inner = self.inner.write().await;
        let instance_id = outcome.instance_id.clone();
        let Some(record) = inner.records.get_mut(&instance_id) else {
            return;
        };
        let was_terminal = record.runtime_status.is_terminal();
        record.runtime_status = RuntimeStatus::from_outcome(outcome.status);
        record.last_updated_time = Utc::now();
        record.output = Some(outcome);

        if !was_terminal {
            inner.finished.push_back(instance_id);
        }
        while inner.finished.len() > self.capacity {
            if let Some(oldest) = inner.finished.pop_front() {
                inner.records.remove(&oldest);
                tracing::debug!(instance_id = %oldest, "Evicted finished instance");
            }
        }
    }

    pub async fn get(&self, instance_id: &str) -> Option<InstanceRecord> {
        self.inner.read().await.records.get(instance_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}
