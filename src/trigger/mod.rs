//! Trigger layer: turn incoming events into orchestration instances.

mod events;
mod instances;
mod watcher;

pub use events::{parse_events, parse_subject, EventBatch, EventGridEvent};
pub use instances::{
    InstanceRecord, InstanceRegistry, RuntimeStatus, DEFAULT_RETAINED_INSTANCES, ORCHESTRATION_NAME,
};
pub use watcher::LocalWatcher;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::models::FileDescriptor;
use crate::orchestrator::Orchestrator;

/// Starts instances in the background and tracks them in the registry.
#[derive(Clone)]
pub struct Launcher {
    orchestrator: Arc<Orchestrator>,
    instances: Arc<InstanceRegistry>,
    storage: StorageConfig,
}

impl Launcher {
    pub fn new(orchestrator: Arc<Orchestrator>, storage: StorageConfig) -> Self {
        Self {
            orchestrator,
            instances: Arc::new(InstanceRegistry::new()),
            storage,
        }
    }

    /// Track instances in `instances` instead of a default registry.
    pub fn with_instances(mut self, instances: Arc<InstanceRegistry>) -> Self {
        self.instances = instances;
        self
    }

    pub fn instances(&self) -> &Arc<InstanceRegistry> {
        &self.instances
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Descriptor for a blob in the source container. Without a URI one is
    /// derived from the storage settings.
    pub fn descriptor(&self, name: &str, uri: Option<&str>) -> FileDescriptor {
        let container = &self.storage.source_container;
        let uri = match uri {
            Some(uri) if !uri.is_empty() => uri.to_string(),
            _ => self.storage.blob_uri(container, name),
        };
        FileDescriptor::new(name, container.as_str(), uri)
    }

    /// Register and spawn one instance; returns its id immediately.
    pub async fn start(&self, mut file: FileDescriptor) -> String {
        if file.source_uri.is_empty() {
            file.source_uri = self.storage.blob_uri(&file.container_id, &file.name);
        }

        let instance_id = Uuid::new_v4().simple().to_string();
        self.instances.register(&instance_id, file.clone()).await;
        info!("Started orchestration {} for {}", instance_id, file.name);

        let orchestrator = self.orchestrator.clone();
        let instances = self.instances.clone();
        let id = instance_id.clone();
        tokio::spawn(async move {
            instances.mark_running(&id).await;
            let outcome = orchestrator.process(file, &id).await;
            instances.finish(outcome).await;
        });

        instance_id
    }
}
