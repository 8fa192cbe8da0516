//! The blob store contract the engine programs against.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Object storage used to fetch photos and persist rendered output.
///
/// Implemented by the S3-compatible client and by the filesystem-backed
/// store used for tests and local development.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> bool;

    /// Download an object to a local file, creating parent directories.
    async fn fetch(&self, key: &str, local_path: &Path) -> StorageResult<()>;

    /// Upload a local file under a key.
    async fn store(&self, local_path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Upload raw bytes under a key.
    async fn store_bytes(&self, data: Vec<u8>, key: &str, content_type: &str)
        -> StorageResult<()>;

    /// Generate a temporary signed download URL, if the store supports it.
    async fn presign_get(&self, _key: &str, _expires_in: Duration) -> StorageResult<Option<String>> {
        Ok(None)
    }
}
