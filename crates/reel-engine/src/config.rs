//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Work directory for per-job scratch space.
    pub work_dir: PathBuf,
    /// Local storage root: uploads live under `<storage_dir>/uploads`,
    /// finished videos under `<storage_dir>/videos`.
    pub storage_dir: PathBuf,
    /// Directory holding background audio tracks.
    pub assets_dir: PathBuf,
    /// Maximum concurrently processing jobs.
    pub max_concurrent_jobs: usize,
    /// Hard cap on a single encode invocation.
    pub encode_timeout: Duration,
    /// Upload finished output to the blob store.
    pub upload_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/photoreel"),
            storage_dir: PathBuf::from("storage"),
            assets_dir: PathBuf::from("assets"),
            max_concurrent_jobs: 2,
            encode_timeout: Duration::from_secs(1800),
            upload_output: true,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/photoreel")),
            storage_dir: std::env::var("REEL_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage")),
            assets_dir: std::env::var("REEL_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("assets")),
            max_concurrent_jobs: std::env::var("REEL_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            encode_timeout: Duration::from_secs(
                std::env::var("REEL_ENCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            upload_output: std::env::var("REEL_UPLOAD_OUTPUT")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }

    /// Uploads directory under the storage root.
    pub fn uploads_dir(&self) -> PathBuf {
        self.storage_dir.join("uploads")
    }

    /// Videos directory under the storage root.
    pub fn videos_dir(&self) -> PathBuf {
        self.storage_dir.join("videos")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert!(config.upload_output);
    }

    #[test]
    fn test_derived_directories() {
        let config = EngineConfig {
            storage_dir: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(config.uploads_dir(), PathBuf::from("/data/uploads"));
        assert_eq!(config.videos_dir(), PathBuf::from("/data/videos"));
    }
}
