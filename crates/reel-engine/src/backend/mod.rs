//! Rendering backends.
//!
//! Two interchangeable variants consume the same render plan: the
//! filter-graph backend derives one external-encoder invocation, the
//! clip-compositing backend rasterizes frames in-process and streams
//! them into an encoder sink. Both share the audio-less retry policy and
//! the `EncodeFailed` / `OutputMissing` failure taxonomy.

pub mod clip_compositor;
pub mod filter_graph;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

use reel_models::{BackendKind, QualityPreset, RenderPlan};

use crate::error::{EngineError, EngineResult};

pub use clip_compositor::ClipCompositorBackend;
pub use filter_graph::FilterGraphBackend;

/// Encoder progress callback: fraction of output time rendered (0..=1).
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// A no-op progress callback.
pub fn null_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    /// Duration of the produced output in seconds.
    pub duration: f64,
    /// Whether audio made it into the output (false after the silent retry).
    pub with_audio: bool,
}

/// A rendering backend: turns a plan into an output file.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Render the plan to `output`, reporting progress along the way.
    async fn render(
        &self,
        plan: &RenderPlan,
        output: &Path,
        progress: ProgressFn,
    ) -> EngineResult<RenderOutcome>;
}

/// Shared render-time settings for the concrete backends.
#[derive(Debug, Clone)]
pub struct BackendContext {
    pub preset: QualityPreset,
    pub encode_timeout: Duration,
    pub cancel_rx: Option<watch::Receiver<bool>>,
}

impl BackendContext {
    pub fn new(preset: QualityPreset, encode_timeout: Duration) -> Self {
        Self {
            preset,
            encode_timeout,
            cancel_rx: None,
        }
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }
}

/// Instantiate the selected backend variant.
pub fn create_backend(kind: BackendKind, ctx: BackendContext) -> Box<dyn RenderBackend> {
    match kind {
        BackendKind::FilterGraph => Box::new(FilterGraphBackend::new(ctx)),
        BackendKind::ClipCompositor => Box::new(ClipCompositorBackend::new(ctx)),
    }
}

/// Render with the one audio-less retry both variants share.
///
/// A failed encode with audio attached is retried once without audio; a
/// retry success completes the job with no error surfaced. Cancellation
/// is never retried.
pub async fn render_with_audio_fallback(
    backend: &dyn RenderBackend,
    plan: &RenderPlan,
    output: &Path,
    progress: ProgressFn,
) -> EngineResult<RenderOutcome> {
    match backend.render(plan, output, Arc::clone(&progress)).await {
        Ok(outcome) => Ok(outcome),
        Err(EngineError::Media(reel_media::MediaError::Cancelled)) => {
            Err(EngineError::Media(reel_media::MediaError::Cancelled))
        }
        Err(e) if plan.audio.is_some() => {
            warn!(
                backend = %backend.kind(),
                "Encode with audio failed ({}), retrying without audio", e
            );
            let silent = plan.without_audio();
            let outcome = backend.render(&silent, output, progress).await?;
            Ok(RenderOutcome {
                with_audio: false,
                ..outcome
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{AudioTrack, Layout, PhotoOrigin, RenderSegment, ResolvedPhoto, SceneKind};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyBackend {
        calls: AtomicUsize,
        fail_with_audio: bool,
    }

    #[async_trait]
    impl RenderBackend for FlakyBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::FilterGraph
        }

        async fn render(
            &self,
            plan: &RenderPlan,
            _output: &Path,
            _progress: ProgressFn,
        ) -> EngineResult<RenderOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_with_audio && plan.audio.is_some() {
                return Err(EngineError::encode_failed("audio stream broke"));
            }
            Ok(RenderOutcome {
                duration: plan.total_duration(),
                with_audio: plan.audio.is_some(),
            })
        }
    }

    fn plan_with_audio() -> RenderPlan {
        RenderPlan {
            segments: vec![RenderSegment {
                scene_id: "s".into(),
                scene_kind: SceneKind::Zoom,
                photos: vec![ResolvedPhoto::new("/tmp/p.jpg", PhotoOrigin::Local, 1)],
                duration: 4.0,
                layout: Layout::Single,
                curves: vec![],
            }],
            width: 1280,
            height: 720,
            fps: 24,
            audio: Some(AudioTrack {
                path: PathBuf::from("/tmp/a.mp3"),
                volume: 0.3,
                fade: 1.0,
                loop_to_fit: true,
            }),
        }
    }

    #[tokio::test]
    async fn test_audio_failure_retries_without_audio() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            fail_with_audio: true,
        };
        let plan = plan_with_audio();

        let outcome =
            render_with_audio_fallback(&backend, &plan, Path::new("/tmp/out.mp4"), null_progress())
                .await
                .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(!outcome.with_audio);
        assert!((outcome.duration - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_success_with_audio_is_not_retried() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            fail_with_audio: false,
        };
        let plan = plan_with_audio();

        let outcome =
            render_with_audio_fallback(&backend, &plan, Path::new("/tmp/out.mp4"), null_progress())
                .await
                .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.with_audio);
    }

    #[tokio::test]
    async fn test_silent_plan_failure_is_not_retried() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            fail_with_audio: true,
        };
        let mut plan = plan_with_audio();
        plan.audio = None;

        // Backend succeeds without audio; a backend failing on a silent
        // plan gets no second chance.
        let outcome =
            render_with_audio_fallback(&backend, &plan, Path::new("/tmp/out.mp4"), null_progress())
                .await
                .unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!outcome.with_audio);
    }
}
