//! Render plan building: turn scene allocations into backend-agnostic
//! segments with animation curves.
//!
//! Grid-style scenes produce one segment holding every allocated photo;
//! all other scene kinds produce one full-frame segment per photo, with
//! the scene duration divided evenly so the plan total always equals the
//! template total.

use tracing::debug;

use reel_models::{
    AnimationCurve, AudioTrack, CurveTarget, CurveValue, Easing, EffectKind, EncodingOptions,
    Layout, RenderPlan, RenderSegment, Scene,
};

use crate::allocator::SceneAllocation;

/// Default fade length in seconds when the effect does not name one.
const DEFAULT_FADE_SECS: f64 = 0.5;

/// Build the ordered segment list for a set of scene allocations.
pub fn build_segments(allocations: &[SceneAllocation<'_>]) -> Vec<RenderSegment> {
    let mut segments = Vec::new();

    for allocation in allocations {
        let scene = allocation.scene;

        if scene.kind.is_grid() {
            segments.push(grid_segment(allocation));
        } else {
            let count = allocation.photos.len().max(1);
            let per_photo = scene.duration / count as f64;
            for photo in &allocation.photos {
                segments.push(RenderSegment {
                    scene_id: scene.id.clone(),
                    scene_kind: scene.kind,
                    photos: vec![photo.clone()],
                    duration: per_photo,
                    layout: Layout::Single,
                    curves: derive_curves(scene, per_photo),
                });
            }
        }
    }

    segments
}

/// Assemble the full render plan.
pub fn build_plan(
    allocations: &[SceneAllocation<'_>],
    options: &EncodingOptions,
    audio: Option<AudioTrack>,
) -> RenderPlan {
    let (width, height) = options.dimensions();

    RenderPlan {
        segments: build_segments(allocations),
        width,
        height,
        fps: options.effective_fps(),
        audio,
    }
}

/// One segment carrying all of a grid scene's photos.
fn grid_segment(allocation: &SceneAllocation<'_>) -> RenderSegment {
    let scene = allocation.scene;
    let (columns, rows) = scene.grid_layout();

    RenderSegment {
        scene_id: scene.id.clone(),
        scene_kind: scene.kind,
        photos: allocation.photos.clone(),
        duration: scene.duration,
        layout: Layout::Grid { columns, rows },
        curves: fade_curves(scene, scene.duration),
    }
}

/// Derive animation curves for a full-frame segment from the scene's
/// effects. Effect kinds without a curve representation (vignette, grain,
/// glow, lighting, blur, slide) are pixel-level decorations outside the
/// plan's scope and are skipped.
fn derive_curves(scene: &Scene, duration: f64) -> Vec<AnimationCurve> {
    let mut curves = Vec::new();

    for effect in &scene.effects {
        match &effect.kind {
            EffectKind::Zoom(zoom) => curves.push(AnimationCurve {
                target: CurveTarget::Scale,
                start: CurveValue::Scalar(zoom.zoom_start),
                end: CurveValue::Scalar(zoom.zoom_end),
                easing: Easing::EaseInOut,
                window: None,
            }),
            EffectKind::Pan(pan) => curves.push(AnimationCurve {
                target: CurveTarget::Position,
                start: CurveValue::Point(pan.pan_start),
                end: CurveValue::Point(pan.pan_end),
                easing: Easing::EaseInOut,
                window: None,
            }),
            EffectKind::Color(color) => curves.push(AnimationCurve {
                target: CurveTarget::Color,
                start: CurveValue::Scalar(color.contrast),
                end: CurveValue::Scalar(color.contrast),
                easing: Easing::Linear,
                window: None,
            }),
            EffectKind::Fade(_) => {}
            other => {
                debug!(
                    scene = %scene.id,
                    effect = other.name(),
                    "Effect kind has no curve representation, skipping"
                );
            }
        }
    }

    curves.extend(fade_curves(scene, duration));
    curves
}

/// Opacity curves for a scene's fade effect, clamped so fade-in and
/// fade-out are each capped at a quarter of the segment duration.
fn fade_curves(scene: &Scene, duration: f64) -> Vec<AnimationCurve> {
    let Some(fade) = scene.fade() else {
        return Vec::new();
    };

    let requested = fade.fade_duration.unwrap_or(DEFAULT_FADE_SECS);
    let fade_len = requested.min(duration / 4.0).max(0.0);
    if fade_len <= 0.0 {
        return Vec::new();
    }

    let mut curves = Vec::new();
    if fade.fade_in {
        curves.push(AnimationCurve {
            target: CurveTarget::Opacity,
            start: CurveValue::Scalar(0.0),
            end: CurveValue::Scalar(1.0),
            easing: Easing::Linear,
            window: Some((0.0, fade_len)),
        });
    }
    if fade.fade_out {
        curves.push(AnimationCurve {
            target: CurveTarget::Opacity,
            start: CurveValue::Scalar(1.0),
            end: CurveValue::Scalar(0.0),
            easing: Easing::Linear,
            window: Some((duration - fade_len, duration)),
        });
    }
    curves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::allocate;
    use reel_models::{
        catalog, Effect, FadeParams, PhotoOrigin, ResolvedPhoto, SceneKind, Template, ZoomParams,
    };

    fn photos(n: usize) -> Vec<ResolvedPhoto> {
        (0..n)
            .map(|i| ResolvedPhoto::new(format!("/tmp/p{i}.jpg"), PhotoOrigin::Local, 1))
            .collect()
    }

    fn two_scene_template() -> Template {
        Template {
            id: "t".into(),
            name: "T".into(),
            description: String::new(),
            max_photos: 6,
            background_audio: None,
            scenes: vec![
                reel_models::Scene {
                    id: "grid".into(),
                    name: "Grid".into(),
                    kind: SceneKind::Grid,
                    duration: 8.0,
                    max_photos: 6,
                    effects: vec![],
                    order: 1,
                },
                reel_models::Scene {
                    id: "zoom".into(),
                    name: "Zoom".into(),
                    kind: SceneKind::Zoom,
                    duration: 4.0,
                    max_photos: 6,
                    effects: vec![Effect {
                        id: "z".into(),
                        duration: 4.0,
                        kind: EffectKind::Zoom(ZoomParams {
                            zoom_start: 1.0,
                            zoom_end: 1.3,
                        }),
                    }],
                    order: 2,
                },
            ],
        }
    }

    fn total(segments: &[RenderSegment]) -> f64 {
        segments.iter().map(|s| s.duration).sum()
    }

    #[test]
    fn test_total_duration_equals_template_total() {
        let template = two_scene_template();

        for n in [1, 3, 5] {
            let allocations = allocate(&template, &photos(n)).unwrap();
            let segments = build_segments(&allocations);
            assert!(
                (total(&segments) - template.total_duration()).abs() < 1e-9,
                "duration mismatch with {n} photos"
            );
        }
    }

    #[test]
    fn test_grid_scene_is_one_segment_with_all_photos() {
        let template = two_scene_template();
        let allocations = allocate(&template, &photos(3)).unwrap();
        let segments = build_segments(&allocations);

        assert_eq!(segments[0].photos.len(), 3);
        assert_eq!(segments[0].layout, Layout::Grid { columns: 3, rows: 2 });
        assert!((segments[0].duration - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_scene_is_one_segment_per_photo() {
        let template = two_scene_template();
        let allocations = allocate(&template, &photos(3)).unwrap();
        let segments = build_segments(&allocations);

        // Grid segment + one zoom segment (cursor exhausted -> 1 photo).
        let zoom_segments: Vec<_> = segments
            .iter()
            .filter(|s| s.scene_kind == SceneKind::Zoom)
            .collect();
        assert_eq!(zoom_segments.len(), 1);
        assert_eq!(zoom_segments[0].layout, Layout::Single);

        let scale = zoom_segments[0].curve(CurveTarget::Scale).unwrap();
        assert!((scale.start.as_scalar() - 1.0).abs() < 1e-9);
        assert!((scale.end.as_scalar() - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_fade_caps_at_quarter_duration() {
        let mut template = two_scene_template();
        template.scenes[1].effects.push(Effect {
            id: "f".into(),
            duration: 4.0,
            kind: EffectKind::Fade(FadeParams {
                fade_in: true,
                fade_out: true,
                fade_duration: Some(10.0),
                ..Default::default()
            }),
        });

        let allocations = allocate(&template, &photos(7)).unwrap();
        let segments = build_segments(&allocations);
        let zoom_segment = segments
            .iter()
            .find(|s| s.scene_kind == SceneKind::Zoom)
            .unwrap();

        let duration = zoom_segment.duration;
        for curve in zoom_segment.curves_for(CurveTarget::Opacity) {
            let (begin, end) = curve.window.unwrap();
            assert!(end - begin <= duration / 4.0 + 1e-9);
        }
        // fade-in + fade-out together never exceed the segment duration
        let fade_total: f64 = zoom_segment
            .curves_for(CurveTarget::Opacity)
            .map(|c| {
                let (b, e) = c.window.unwrap();
                e - b
            })
            .sum();
        assert!(fade_total <= duration + 1e-9);
    }

    #[test]
    fn test_catalog_templates_build_valid_plans() {
        for template in catalog::all() {
            let allocations = allocate(template, &photos(4)).unwrap();
            let plan = build_plan(&allocations, &EncodingOptions::default(), None);

            assert!(!plan.segments.is_empty());
            assert!(plan.segments.iter().all(|s| !s.photos.is_empty()));
            assert!((plan.total_duration() - template.total_duration()).abs() < 1e-9);
        }
    }
}
