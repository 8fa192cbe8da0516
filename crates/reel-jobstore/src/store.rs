//! The job/config store contract and the in-memory implementation.
//!
//! The engine never invents job identifiers and never deletes records;
//! it creates one record per accepted job and patches status fields as
//! composition progresses.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use reel_models::{JobState, JobStatus};

use crate::error::{JobStoreError, JobStoreResult};

/// A stored job record: status plus the opaque job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    /// Opaque configuration payload as submitted by the caller.
    #[serde(default)]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// New pending record for a job.
    pub fn new(job_id: impl Into<String>, config: serde_json::Value) -> Self {
        let job_id = job_id.into();
        Self {
            status: JobStatus::pending(job_id.clone()),
            job_id,
            config,
            created_at: Utc::now(),
        }
    }
}

/// Partial status update applied through [`JobStore::update`].
///
/// `None` fields are left untouched; `output`/`error_message` use a double
/// Option so a patch can explicitly clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPatch {
    pub state: Option<JobState>,
    pub progress: Option<u8>,
    pub output: Option<Option<String>>,
    pub error_message: Option<Option<String>>,
}

impl StatusPatch {
    pub fn state(state: JobState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error_message = Some(error);
        self
    }
}

/// Key-value job store keyed by job identifier.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job record.
    async fn get(&self, job_id: &str) -> JobStoreResult<Option<JobRecord>>;

    /// Create a new record; fails if the id is already present.
    async fn create(&self, record: JobRecord) -> JobStoreResult<()>;

    /// Apply a partial status update to an existing record.
    async fn update(&self, job_id: &str, patch: StatusPatch) -> JobStoreResult<JobStatus>;
}

/// In-memory [`JobStore`] over a read-write locked map.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: &str) -> JobStoreResult<Option<JobRecord>> {
        Ok(self.records.read().await.get(job_id).cloned())
    }

    async fn create(&self, record: JobRecord) -> JobStoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.job_id) {
            return Err(JobStoreError::AlreadyExists(record.job_id));
        }
        records.insert(record.job_id.clone(), record);
        Ok(())
    }

    async fn update(&self, job_id: &str, patch: StatusPatch) -> JobStoreResult<JobStatus> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| JobStoreError::not_found(job_id))?;

        if let Some(state) = patch.state {
            record.status.state = state;
        }
        if let Some(progress) = patch.progress {
            record.status.progress = progress.min(100);
        }
        if let Some(output) = patch.output {
            record.status.output = output;
        }
        if let Some(error) = patch.error_message {
            record.status.error_message = error;
        }
        record.status.updated_at = Utc::now();

        Ok(record.status.clone())
    }
}
