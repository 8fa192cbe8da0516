//! Template-driven photo-to-video composition engine.
//!
//! The engine resolves a template and a photo set into a concrete render
//! plan, drives one of two interchangeable rendering backends to produce
//! the output file, reports progress to the job store, and recovers from
//! missing assets and encoding failures:
//!
//! - [`resolver`] maps photo references to local files (local / fetched /
//!   substituted)
//! - [`allocator`] distributes photos across template scenes with
//!   circular wraparound
//! - [`planner`] derives backend-agnostic render segments and animation
//!   curves
//! - [`backend`] hosts the filter-graph and clip-compositing variants
//!   plus the shared audio-less retry
//! - [`reporter`] owns the job status state machine
//! - [`composer`] dispatches workers and exposes `compose`/`get_status`

pub mod allocator;
pub mod audio;
pub mod backend;
pub mod composer;
pub mod config;
pub mod error;
pub mod logging;
pub mod planner;
pub mod reporter;
pub mod resolver;
pub mod scope;

pub use allocator::{allocate, SceneAllocation};
pub use audio::resolve_audio;
pub use backend::{
    create_backend, null_progress, render_with_audio_fallback, BackendContext,
    ClipCompositorBackend, FilterGraphBackend, ProgressFn, RenderBackend, RenderOutcome,
};
pub use composer::{BackendFactory, Composer};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use logging::JobLogger;
pub use planner::{build_plan, build_segments};
pub use reporter::{checkpoint, StatusReporter};
pub use resolver::PhotoResolver;
pub use scope::TempScope;
