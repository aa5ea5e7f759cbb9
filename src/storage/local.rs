//! Filesystem-backed blob store for local development.
//!
//! Containers are subdirectories of the root; blob names may contain `/`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{BlobStore, CopyStatus};
use crate::error::{PipelineError, Result};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a blob path, refusing names that climb out of the container.
    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes || container.contains(['/', '\\']) {
            return Err(PipelineError::Storage(format!(
                "invalid blob path {}/{}",
                container, name
            )));
        }
        Ok(self.root.join(container).join(relative))
    }
}

fn source_path(source_url: &str) -> PathBuf {
    PathBuf::from(source_url.strip_prefix("file://").unwrap_or(source_url))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        let path = self.blob_path(container, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn copy(&self, container: &str, name: &str, source_url: &str) -> Result<CopyStatus> {
        let target = self.blob_path(container, name)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source_path(source_url), &target).await?;
        Ok(CopyStatus::Success)
    }

    async fn copy_status(&self, container: &str, name: &str) -> Result<CopyStatus> {
        let path = self.blob_path(container, name)?;
        if tokio::fs::try_exists(&path).await? {
            Ok(CopyStatus::Success)
        } else {
            Err(PipelineError::Storage(format!(
                "blob {}/{} does not exist",
                container, name
            )))
        }
    }

    async fn delete(&self, container: &str, name: &str) -> Result<()> {
        let path = self.blob_path(container, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn container_url(&self, container: &str) -> String {
        self.root.join(container).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_escaping_names() {
        let store = LocalBlobStore::new("/tmp/blobs");
        assert!(store.blob_path("final", "../etc/passwd").is_err());
        assert!(store.blob_path("final", "/abs").is_err());
        assert!(store.blob_path("final", "").is_err());
        assert!(store.blob_path("a/b", "x.json").is_err());
        assert_eq!(
            store.blob_path("final", "nested/x.json").unwrap(),
            PathBuf::from("/tmp/blobs/final/nested/x.json")
        );
    }

    #[tokio::test]
    async fn test_write_copy_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store
            .write("silver", "a/b.pdf", b"data".to_vec(), "application/pdf")
            .await
            .unwrap();
        let source = format!("{}/a/b.pdf", store.container_url("silver"));

        let status = store.copy("silver", "b_redacted.pdf", &source).await.unwrap();
        assert_eq!(status, CopyStatus::Success);
        assert_eq!(
            store.copy_status("silver", "b_redacted.pdf").await.unwrap(),
            CopyStatus::Success
        );

        store.delete("silver", "a/b.pdf").await.unwrap();
        assert!(!dir.path().join("silver/a/b.pdf").exists());
        // Deleting again is not an error.
        store.delete("silver", "a/b.pdf").await.unwrap();
    }
}
