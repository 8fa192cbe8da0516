//! The composition engine facade.
//!
//! `compose` validates a job, records it in the job store and dispatches
//! an independent worker task; the caller is never blocked on the render.
//! At most one worker may process a given job id at a time: a re-trigger
//! of an active job is a no-op, and the owning worker is the only writer
//! of its job's status.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use reel_jobstore::{JobRecord, JobStore, JobStoreError};
use reel_models::{catalog, EncodingOptions, JobStatus, PhotoRef, ResolvedPhoto, Template};
use reel_storage::ObjectStore;

use crate::allocator;
use crate::audio::resolve_audio;
use crate::backend::{
    create_backend, render_with_audio_fallback, BackendContext, ProgressFn, RenderBackend,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::logging::JobLogger;
use crate::planner::build_plan;
use crate::reporter::{checkpoint, StatusReporter};
use crate::resolver::PhotoResolver;
use crate::scope::TempScope;

/// Factory used to instantiate the selected backend; injectable for tests.
pub type BackendFactory =
    Arc<dyn Fn(reel_models::BackendKind, BackendContext) -> Box<dyn RenderBackend> + Send + Sync>;

/// The template-driven composition engine.
pub struct Composer {
    config: EngineConfig,
    job_store: Arc<dyn JobStore>,
    blob_store: Arc<dyn ObjectStore>,
    /// Jobs currently owned by a worker, with their cancellation senders.
    active: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
    job_semaphore: Arc<Semaphore>,
    backend_factory: BackendFactory,
}

impl Composer {
    pub fn new(
        config: EngineConfig,
        job_store: Arc<dyn JobStore>,
        blob_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            config,
            job_store,
            blob_store,
            active: Arc::new(Mutex::new(HashMap::new())),
            job_semaphore,
            backend_factory: Arc::new(create_backend),
        }
    }

    /// Replace the backend factory (used by tests to inject mock backends).
    pub fn with_backend_factory(mut self, factory: BackendFactory) -> Self {
        self.backend_factory = factory;
        self
    }

    /// Compose using a catalog template id.
    pub async fn compose(
        &self,
        job_id: &str,
        template_id: &str,
        photo_refs: Vec<PhotoRef>,
        options: EncodingOptions,
    ) -> EngineResult<()> {
        let template = catalog::get(template_id)
            .ok_or_else(|| EngineError::template_invalid(format!("unknown template '{template_id}'")))?;
        self.compose_with_template(job_id, template.clone(), photo_refs, options)
            .await
    }

    /// Compose using an explicit template definition.
    pub async fn compose_with_template(
        &self,
        job_id: &str,
        template: Template,
        photo_refs: Vec<PhotoRef>,
        options: EncodingOptions,
    ) -> EngineResult<()> {
        // Rejected before any work starts.
        template
            .validate()
            .map_err(|e| EngineError::template_invalid(e.to_string()))?;
        if photo_refs.len() > template.max_photos as usize {
            return Err(EngineError::template_invalid(format!(
                "template '{}' accepts at most {} photos, got {}",
                template.id,
                template.max_photos,
                photo_refs.len()
            )));
        }

        // Record the job before dispatching so status is immediately
        // observable. A pre-existing record (created by the API layer) is
        // fine; a terminal one is already finished.
        let config_payload = serde_json::json!({
            "template_id": template.id,
            "photo_count": photo_refs.len(),
            "options": options,
        });
        match self
            .job_store
            .create(JobRecord::new(job_id, config_payload))
            .await
        {
            Ok(()) => {}
            Err(JobStoreError::AlreadyExists(_)) => {
                if let Some(record) = self.job_store.get(job_id).await? {
                    if record.status.is_terminal() {
                        return Err(EngineError::JobAlreadyFinished(job_id.to_string()));
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }

        // One worker per job id: an active job is a no-op re-trigger.
        let cancel_rx = {
            let mut active = self.active.lock().expect("active set poisoned");
            if active.contains_key(job_id) {
                info!(job_id, "Job already processing, ignoring re-trigger");
                return Ok(());
            }
            let (cancel_tx, cancel_rx) = watch::channel(false);
            active.insert(job_id.to_string(), cancel_tx);
            cancel_rx
        };

        let worker = Worker {
            config: self.config.clone(),
            job_store: Arc::clone(&self.job_store),
            blob_store: Arc::clone(&self.blob_store),
            backend_factory: Arc::clone(&self.backend_factory),
            job_id: job_id.to_string(),
            template,
            photo_refs,
            options,
            cancel_rx,
        };

        let active = Arc::clone(&self.active);
        let semaphore = Arc::clone(&self.job_semaphore);
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            worker.run().await;
            if let Ok(mut active) = active.lock() {
                active.remove(&job_id);
            }
        });

        Ok(())
    }

    /// Current status of a job, if known.
    pub async fn get_status(&self, job_id: &str) -> EngineResult<Option<JobStatus>> {
        Ok(self.job_store.get(job_id).await?.map(|r| r.status))
    }

    /// Request cancellation of an active job. Returns whether a worker
    /// was signalled.
    pub fn cancel(&self, job_id: &str) -> bool {
        let active = self.active.lock().expect("active set poisoned");
        match active.get(job_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Job ids currently being processed (snapshot).
    pub fn active_jobs(&self) -> Vec<String> {
        self.active
            .lock()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// One job's worker: owns the pipeline from resolution to upload.
struct Worker {
    config: EngineConfig,
    job_store: Arc<dyn JobStore>,
    blob_store: Arc<dyn ObjectStore>,
    backend_factory: BackendFactory,
    job_id: String,
    template: Template,
    photo_refs: Vec<PhotoRef>,
    options: EncodingOptions,
    cancel_rx: watch::Receiver<bool>,
}

impl Worker {
    async fn run(self) {
        let logger = JobLogger::new(&self.job_id, "compose");
        logger.log_start(&format!(
            "template {} with {} photos via {}",
            self.template.id,
            self.photo_refs.len(),
            self.options.backend
        ));

        let reporter = Arc::new(StatusReporter::new(
            Arc::clone(&self.job_store),
            self.job_id.clone(),
        ));

        let scope = match TempScope::create(&self.config.work_dir, &self.job_id).await {
            Ok(scope) => scope,
            Err(e) => {
                logger.log_error(&format!("failed to create scratch dir: {e}"));
                let _ = reporter.fail(e.to_string()).await;
                return;
            }
        };

        match self.pipeline(&reporter, &scope).await {
            Ok(output) => {
                if let Err(e) = reporter.complete(&output).await {
                    logger.log_warning(&format!("completion status not recorded: {e}"));
                }
                logger.log_completion(&format!("output at {output}"));
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                if let Err(report_err) = reporter.fail(e.to_string()).await {
                    logger.log_warning(&format!("failure status not recorded: {report_err}"));
                }
            }
        }

        // Scratch space is released on every exit path.
        scope.cleanup().await;
    }

    async fn pipeline(&self, reporter: &Arc<StatusReporter>, scope: &TempScope) -> EngineResult<String> {
        reporter.accepted().await?;

        // Resolve and optimize photos.
        let resolver = PhotoResolver::new(Arc::clone(&self.blob_store), &self.config);
        let resolved = resolver.resolve_all(&self.photo_refs, scope).await?;

        let optimized = self.optimize(&resolved, scope).await?;
        reporter.processing(checkpoint::PHOTOS_READY).await?;

        // Allocate scenes and build the plan.
        let allocations = allocator::allocate(&self.template, &optimized)?;
        let audio = resolve_audio(
            &self.template,
            &self.config.assets_dir,
            self.options.background_audio,
            self.template.total_duration(),
        );
        let plan = build_plan(&allocations, &self.options, audio);
        reporter.processing(checkpoint::PLAN_BUILT).await?;

        // Render into job scratch space; only a finished encode is moved
        // into the videos directory, so partial output never lands there.
        let file_name = format!("{}_video.{}", self.job_id, self.options.format);
        let scratch_output = scope.dir().join(&file_name);

        let backend_ctx = BackendContext::new(self.options.quality, self.config.encode_timeout)
            .with_cancel(self.cancel_rx.clone());
        let backend = (self.backend_factory)(self.options.backend, backend_ctx);

        let progress = self.encode_progress_bridge(reporter);
        let outcome =
            render_with_audio_fallback(backend.as_ref(), &plan, &scratch_output, progress).await?;

        let output_dir = self.config.videos_dir().join(&self.job_id);
        tokio::fs::create_dir_all(&output_dir).await?;
        let output_path = output_dir.join(&file_name);
        reel_media::move_file(&scratch_output, &output_path).await?;

        info!(
            job_id = %self.job_id,
            duration = outcome.duration,
            with_audio = outcome.with_audio,
            "Encode finished"
        );

        // Persist the output; a failed upload keeps the local file.
        reporter.processing(checkpoint::FINALIZING).await?;
        Ok(self.finalize_output(&output_path).await)
    }

    /// Optimization is best-effort CPU work, run off the async runtime.
    /// Origins survive optimization; a photo that fails keeps its
    /// original path.
    async fn optimize(
        &self,
        resolved: &[ResolvedPhoto],
        scope: &TempScope,
    ) -> EngineResult<Vec<ResolvedPhoto>> {
        let opt_dir = scope.subdir(&format!("opt_{}", self.job_id)).await?;
        let paths: Vec<PathBuf> = resolved.iter().map(|p| p.path.clone()).collect();
        let preset = self.options.quality;

        let optimized_paths =
            tokio::task::spawn_blocking(move || reel_media::optimize_photos(&paths, preset, &opt_dir))
                .await
                .map_err(|e| EngineError::encode_failed(format!("optimization panicked: {e}")))?;

        Ok(resolved
            .iter()
            .zip(optimized_paths)
            .map(|(original, path)| {
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                ResolvedPhoto {
                    path,
                    origin: original.origin,
                    size_bytes: size,
                }
            })
            .collect())
    }

    /// Bridge the backends' synchronous progress callback into async
    /// status updates, keeping the reporter single-writer.
    fn encode_progress_bridge(&self, reporter: &Arc<StatusReporter>) -> ProgressFn {
        let (tx, mut rx) = watch::channel(0.0f64);
        let reporter = Arc::clone(reporter);

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let fraction = *rx.borrow();
                // Updates after a terminal transition are expected to be
                // rejected; nothing to do about them here.
                let _ = reporter.encode_progress(fraction).await;
            }
        });

        Arc::new(move |fraction| {
            let _ = tx.send(fraction);
        })
    }

    /// Upload the finished output when configured; fall back to the
    /// local path when the blob store rejects it.
    async fn finalize_output(&self, output_path: &std::path::Path) -> String {
        if !self.config.upload_output {
            return output_path.display().to_string();
        }

        let key = format!("videos/{}_video.{}", self.job_id, self.options.format);
        match self
            .blob_store
            .store(output_path, &key, "video/mp4")
            .await
        {
            Ok(()) => {
                info!(job_id = %self.job_id, key = %key, "Output uploaded");
                format!("storage://{key}")
            }
            Err(e) => {
                warn!(
                    job_id = %self.job_id,
                    "Output upload failed, keeping local file: {}", e
                );
                output_path.display().to_string()
            }
        }
    }
}
