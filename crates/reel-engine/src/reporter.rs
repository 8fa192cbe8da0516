//! Job status reporting.
//!
//! The reporter is the only writer of a job's status record. Progress is
//! monotonic non-decreasing while the job is active, a job settles into a
//! terminal state exactly once, and failures reset progress to zero with
//! a human-readable message.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::warn;

use reel_jobstore::{JobStore, StatusPatch};
use reel_models::JobState;

use crate::error::{EngineError, EngineResult};

/// Well-defined progress checkpoints.
pub mod checkpoint {
    /// Job accepted, worker dispatched.
    pub const ACCEPTED: u8 = 5;
    /// Photos resolved and optimized.
    pub const PHOTOS_READY: u8 = 25;
    /// Render plan built, encode about to start.
    pub const PLAN_BUILT: u8 = 50;
    /// Floor of the mid-encode progress range.
    pub const ENCODE_FLOOR: u8 = 25;
    /// Ceiling of the mid-encode progress range.
    pub const ENCODE_CEILING: u8 = 85;
    /// Output uploaded / finalizing.
    pub const FINALIZING: u8 = 90;
}

/// Single-writer status reporter for one job.
pub struct StatusReporter {
    store: Arc<dyn JobStore>,
    job_id: String,
    last_progress: AtomicU8,
    terminal: AtomicBool,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
            last_progress: AtomicU8::new(0),
            terminal: AtomicBool::new(false),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Transition to processing at the accepted checkpoint.
    pub async fn accepted(&self) -> EngineResult<()> {
        self.update(JobState::Processing, checkpoint::ACCEPTED).await
    }

    /// Report a processing checkpoint.
    pub async fn processing(&self, progress: u8) -> EngineResult<()> {
        self.update(JobState::Processing, progress).await
    }

    /// Report encoder progress as a fraction (0..=1), scaled into the
    /// mid-encode range.
    pub async fn encode_progress(&self, fraction: f64) -> EngineResult<()> {
        let span = (checkpoint::ENCODE_CEILING - checkpoint::ENCODE_FLOOR) as f64;
        let progress = checkpoint::ENCODE_FLOOR as f64 + fraction.clamp(0.0, 1.0) * span;
        self.update(JobState::Processing, progress as u8).await
    }

    /// Settle the job as completed with its output location.
    pub async fn complete(&self, output: impl Into<String>) -> EngineResult<()> {
        self.enter_terminal()?;
        self.store
            .update(
                &self.job_id,
                StatusPatch::state(JobState::Completed)
                    .with_progress(100)
                    .with_output(Some(output.into()))
                    .with_error(None),
            )
            .await?;
        Ok(())
    }

    /// Settle the job as failed. Partial output is never referenced from
    /// the terminal status.
    pub async fn fail(&self, error: impl Into<String>) -> EngineResult<()> {
        self.enter_terminal()?;
        self.store
            .update(
                &self.job_id,
                StatusPatch::state(JobState::Error)
                    .with_progress(0)
                    .with_output(None)
                    .with_error(Some(error.into())),
            )
            .await?;
        Ok(())
    }

    /// Whether this reporter already settled its job.
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    fn enter_terminal(&self) -> EngineResult<()> {
        if self.terminal.swap(true, Ordering::SeqCst) {
            return Err(EngineError::JobAlreadyFinished(self.job_id.clone()));
        }
        Ok(())
    }

    async fn update(&self, state: JobState, progress: u8) -> EngineResult<()> {
        if self.terminal.load(Ordering::SeqCst) {
            return Err(EngineError::JobAlreadyFinished(self.job_id.clone()));
        }

        // Monotonic non-decreasing while active: encoder reports scaled
        // into 25-85 may lag a checkpoint already written.
        let progress = self
            .last_progress
            .fetch_max(progress, Ordering::SeqCst)
            .max(progress);

        if let Err(e) = self
            .store
            .update(
                &self.job_id,
                StatusPatch::state(state).with_progress(progress),
            )
            .await
        {
            warn!(job_id = %self.job_id, "Status update failed: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_jobstore::{JobRecord, MemoryJobStore};
    use reel_models::JobStatus;

    async fn reporter() -> (Arc<MemoryJobStore>, StatusReporter) {
        let store = Arc::new(MemoryJobStore::new());
        store
            .create(JobRecord::new("J1", serde_json::Value::Null))
            .await
            .unwrap();
        let reporter = StatusReporter::new(store.clone() as Arc<dyn JobStore>, "J1");
        (store, reporter)
    }

    async fn status(store: &MemoryJobStore) -> JobStatus {
        store.get("J1").await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let (store, reporter) = reporter().await;

        reporter.accepted().await.unwrap();
        reporter.processing(checkpoint::PLAN_BUILT).await.unwrap();
        // Encoder starts low; must not move progress backwards.
        reporter.encode_progress(0.0).await.unwrap();
        assert_eq!(status(&store).await.progress, checkpoint::PLAN_BUILT);

        reporter.encode_progress(0.5).await.unwrap();
        assert_eq!(status(&store).await.progress, 55);
    }

    #[tokio::test]
    async fn test_encode_progress_scales_into_range() {
        let (store, reporter) = reporter().await;

        reporter.accepted().await.unwrap();
        reporter.encode_progress(1.0).await.unwrap();
        assert_eq!(status(&store).await.progress, checkpoint::ENCODE_CEILING);
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_transition() {
        let (store, reporter) = reporter().await;

        reporter.accepted().await.unwrap();
        reporter.complete("videos/J1_video.mp4").await.unwrap();

        let s = status(&store).await;
        assert_eq!(s.state, JobState::Completed);
        assert_eq!(s.progress, 100);
        assert_eq!(s.output.as_deref(), Some("videos/J1_video.mp4"));

        // Second terminal transition is rejected as already-finished.
        assert!(matches!(
            reporter.fail("late failure").await,
            Err(EngineError::JobAlreadyFinished(_))
        ));
        assert_eq!(status(&store).await.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_failure_resets_progress_and_clears_output() {
        let (store, reporter) = reporter().await;

        reporter.accepted().await.unwrap();
        reporter.processing(checkpoint::FINALIZING).await.unwrap();
        reporter.fail("encoder exploded").await.unwrap();

        let s = status(&store).await;
        assert_eq!(s.state, JobState::Error);
        assert_eq!(s.progress, 0);
        assert!(s.output.is_none());
        assert_eq!(s.error_message.as_deref(), Some("encoder exploded"));
    }

    #[tokio::test]
    async fn test_updates_after_terminal_are_rejected() {
        let (_store, reporter) = reporter().await;

        reporter.accepted().await.unwrap();
        reporter.fail("boom").await.unwrap();

        assert!(matches!(
            reporter.processing(60).await,
            Err(EngineError::JobAlreadyFinished(_))
        ));
    }
}
