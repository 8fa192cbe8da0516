//! Job store error types.

use thiserror::Error;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Errors that can occur against the job store.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl JobStoreError {
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound(job_id.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
