//! Filesystem-backed object store.
//!
//! Keys map to paths relative to a root directory. Used by tests and by
//! single-machine deployments where photos already live on local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Directory-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created if missing.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its backing path, rejecting traversal outside root.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn exists(&self, key: &str) -> bool {
        match self.key_path(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn fetch(&self, key: &str, local_path: &Path) -> StorageResult<()> {
        let src = self.key_path(key)?;
        if !tokio::fs::try_exists(&src).await.unwrap_or(false) {
            return Err(StorageError::not_found(key));
        }

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::copy(&src, local_path).await.map_err(|e| {
            StorageError::download_failed(format!("copy {} failed: {}", src.display(), e))
        })?;

        debug!("Fetched {} to {}", key, local_path.display());
        Ok(())
    }

    async fn store(&self, local_path: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let dst = self.key_path(key)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::copy(local_path, &dst).await.map_err(|e| {
            StorageError::upload_failed(format!("copy to {} failed: {}", dst.display(), e))
        })?;

        debug!("Stored {} as {}", local_path.display(), key);
        Ok(())
    }

    async fn store_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<()> {
        let dst = self.key_path(key)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&dst, data)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_fetch_round_trip() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = FsStore::new(root.path()).unwrap();

        store
            .store_bytes(b"photo bytes".to_vec(), "uploads/a/photo.jpg", "image/jpeg")
            .await
            .unwrap();
        assert!(store.exists("uploads/a/photo.jpg").await);

        let local = scratch.path().join("fetched.jpg");
        store.fetch("uploads/a/photo.jpg", &local).await.unwrap();
        assert_eq!(tokio::fs::read(&local).await.unwrap(), b"photo bytes");
    }

    #[tokio::test]
    async fn test_missing_key_reports_not_found() {
        let root = TempDir::new().unwrap();
        let store = FsStore::new(root.path()).unwrap();

        assert!(!store.exists("nope.jpg").await);
        let err = store
            .fetch("nope.jpg", &root.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let root = TempDir::new().unwrap();
        let store = FsStore::new(root.path()).unwrap();

        let err = store
            .fetch("../outside.jpg", &root.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
