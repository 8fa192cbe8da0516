//! Engine error types.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Template invalid: {0}")]
    TemplateInvalid(String),

    #[error("Photo unavailable: {0}")]
    PhotoUnavailable(String),

    #[error("No photos available anywhere in local storage")]
    NoPhotosAvailable,

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Output missing: encoder reported success but {0} does not exist")]
    OutputMissing(String),

    #[error("Job already finished: {0}")]
    JobAlreadyFinished(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Job store error: {0}")]
    JobStore(#[from] reel_jobstore::JobStoreError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn template_invalid(msg: impl Into<String>) -> Self {
        Self::TemplateInvalid(msg.into())
    }

    pub fn photo_unavailable(msg: impl Into<String>) -> Self {
        Self::PhotoUnavailable(msg.into())
    }

    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Rejected before any work starts; never retried.
    pub fn is_rejection(&self) -> bool {
        matches!(self, EngineError::TemplateInvalid(_))
    }

    /// Fatal for the job after all fallbacks are exhausted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::NoPhotosAvailable
                | EngineError::EncodeFailed(_)
                | EngineError::OutputMissing(_)
        )
    }
}
