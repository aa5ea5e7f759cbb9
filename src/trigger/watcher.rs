//! Local development trigger: poll the source container directory.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::Launcher;
use crate::config::StorageConfig;
use crate::retry::ShutdownSignal;

pub struct LocalWatcher {
    dir: PathBuf,
    interval: Duration,
    seen: HashSet<String>,
}

impl LocalWatcher {
    pub fn new(storage: &StorageConfig, interval: Duration) -> Self {
        Self {
            dir: storage.local_root.join(&storage.source_container),
            interval,
            seen: HashSet::new(),
        }
    }

    /// Names (relative to the container, `/`-separated) not seen before.
    pub async fn scan(&mut self) -> io::Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.dir) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if self.seen.insert(name.clone()) {
                    found.push(name);
                }
            }
        }

        found.sort();
        Ok(found)
    }

    /// Scan at a fixed interval until shutdown, starting one instance per new file.
    pub async fn run(mut self, launcher: Launcher, mut shutdown: ShutdownSignal) {
        info!("Watching {} every {:?}", self.dir.display(), self.interval);
        loop {
            match self.scan().await {
                Ok(names) => {
                    for name in names {
                        debug!("New file {}", name);
                        launcher.start(launcher.descriptor(&name, None)).await;
                    }
                }
                Err(e) => warn!("Failed to scan {}: {}", self.dir.display(), e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Watcher stopping");
                        return;
                    }
                }
            }
        }
    }
}
