//! Shared data models for the Photoreel composition engine.
//!
//! This crate provides Serde-serializable types for:
//! - Templates, scenes and typed effect parameters
//! - Photo references and resolved photos
//! - The backend-agnostic render plan (segments, layouts, animation curves)
//! - Job identity and status lifecycle
//! - Encoding options and the canonical quality preset table

pub mod catalog;
pub mod encoding;
pub mod job;
pub mod photo;
pub mod plan;
pub mod template;

// Re-export common types
pub use encoding::{BackendKind, EncodingOptions, QualityPreset, Resolution};
pub use job::{JobId, JobState, JobStatus};
pub use photo::{PhotoOrigin, PhotoRef, ResolvedPhoto};
pub use plan::{
    AnimationCurve, AudioTrack, CurveTarget, CurveValue, Easing, Layout, RenderPlan,
    RenderSegment,
};
pub use template::{
    Effect, EffectKind, FadeParams, PanParams, Scene, SceneKind, Template, TemplateError, Vec2,
    ZoomParams,
};
