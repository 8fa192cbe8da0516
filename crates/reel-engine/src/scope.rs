//! Job-scoped temporary resource management.
//!
//! Every composition job gets a scratch directory under the engine work
//! dir. Fetched photos, optimized photos and intermediate files all live
//! inside it (or are registered against it), and the scope is released on
//! every exit path: explicit cleanup on success and failure, with a Drop
//! backstop for panics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::EngineResult;

/// Scoped owner of a job's temporary files.
pub struct TempScope {
    job_dir: PathBuf,
    /// Paths outside the job dir that still belong to this job.
    registered: Mutex<Vec<PathBuf>>,
    cleaned: AtomicBool,
}

impl TempScope {
    /// Create the scratch directory `work_dir/<job_id>`.
    pub async fn create(work_dir: &Path, job_id: &str) -> EngineResult<Self> {
        let job_dir = work_dir.join(job_id);
        tokio::fs::create_dir_all(&job_dir).await?;

        Ok(Self {
            job_dir,
            registered: Mutex::new(Vec::new()),
            cleaned: AtomicBool::new(false),
        })
    }

    /// The job's scratch directory.
    pub fn dir(&self) -> &Path {
        &self.job_dir
    }

    /// A named subdirectory inside the scratch dir, created on demand.
    pub async fn subdir(&self, name: &str) -> EngineResult<PathBuf> {
        let dir = self.job_dir.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Register an extra path for removal at cleanup time.
    pub fn register(&self, path: impl Into<PathBuf>) {
        if let Ok(mut registered) = self.registered.lock() {
            registered.push(path.into());
        }
    }

    /// Remove all registered paths and the scratch directory.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }

        let extras: Vec<PathBuf> = match self.registered.lock() {
            Ok(mut registered) => registered.drain(..).collect(),
            Err(_) => Vec::new(),
        };

        for path in extras {
            let result = if path.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            if let Err(e) = result {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp path {}: {}", path.display(), e);
                }
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&self.job_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove job scratch dir {}: {}",
                    self.job_dir.display(),
                    e
                );
            }
        } else {
            debug!("Removed job scratch dir {}", self.job_dir.display());
        }
    }
}

impl Drop for TempScope {
    fn drop(&mut self) {
        if !self.cleaned.swap(true, Ordering::SeqCst) {
            // Backstop for panic/early-drop paths; blocking removal is
            // acceptable here because it only runs when cleanup() was missed.
            warn!(
                "TempScope dropped without cleanup(), removing {}",
                self.job_dir.display()
            );
            let _ = std::fs::remove_dir_all(&self.job_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cleanup_removes_scratch_dir_and_registered_paths() {
        let work = TempDir::new().unwrap();
        let scope = TempScope::create(work.path(), "JOB1").await.unwrap();

        let inner = scope.subdir("opt_JOB1").await.unwrap();
        tokio::fs::write(inner.join("photo.jpg"), b"x").await.unwrap();

        let outside = work.path().join("stray.jpg");
        tokio::fs::write(&outside, b"y").await.unwrap();
        scope.register(&outside);

        scope.cleanup().await;

        assert!(!scope.dir().exists());
        assert!(!outside.exists());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let work = TempDir::new().unwrap();
        let scope = TempScope::create(work.path(), "JOB2").await.unwrap();

        scope.cleanup().await;
        scope.cleanup().await;

        assert!(!scope.dir().exists());
    }

    #[tokio::test]
    async fn test_drop_backstop_removes_dir() {
        let work = TempDir::new().unwrap();
        let dir;
        {
            let scope = TempScope::create(work.path(), "JOB3").await.unwrap();
            dir = scope.dir().to_path_buf();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
    }
}
