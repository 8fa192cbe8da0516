//! S3-compatible blob store client (R2/MinIO).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Configuration for the S3-compatible store.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL.
    pub endpoint_url: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Bucket name.
    pub bucket_name: String,
    /// Region ("auto" for R2).
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("BLOB_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("BLOB_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("BLOB_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("BLOB_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("BLOB_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("BLOB_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("BLOB_BUCKET")
                .map_err(|_| StorageError::config_error("BLOB_BUCKET not set"))?,
            region: std::env::var("BLOB_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "photoreel",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    /// Download object as bytes.
    pub async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, key: &str) -> bool {
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .is_ok()
    }

    async fn fetch(&self, key: &str, local_path: &Path) -> StorageResult<()> {
        debug!("Downloading {} to {}", key, local_path.display());

        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }

        tokio::fs::write(local_path, bytes)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;

        info!("Downloaded {} to {}", key, local_path.display());
        Ok(())
    }

    async fn store(&self, local_path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", local_path.display(), key);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", local_path.display(), key);
        Ok(())
    }

    async fn store_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<Option<String>> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(Some(presigned.uri().to_string()))
    }
}
