//! Built-in template catalog.
//!
//! The catalog is static data: three production templates covering the
//! grid, cinematic and thumbnail-zoom layouts. Callers look templates up
//! by id; unknown ids are a validation error at job submission.

use std::sync::OnceLock;

use crate::template::{
    ColorParams, Effect, EffectKind, FadeParams, GrainParams, LightingParams, PanParams, Scene,
    SceneKind, Template, Vec2, VignetteParams, ZoomParams,
};

/// Default background audio track attached to every built-in template.
pub const DEFAULT_BACKGROUND_TRACK: &str = "source_bg.mp3";

fn zoom(id: &str, duration: f64, start: f64, end: f64) -> Effect {
    Effect {
        id: id.into(),
        duration,
        kind: EffectKind::Zoom(ZoomParams {
            zoom_start: start,
            zoom_end: end,
        }),
    }
}

fn pan(id: &str, duration: f64, end: Vec2) -> Effect {
    Effect {
        id: id.into(),
        duration,
        kind: EffectKind::Pan(PanParams {
            pan_start: Vec2::ZERO,
            pan_end: end,
        }),
    }
}

fn fade(id: &str, duration: f64, fade_in: bool, fade_out: bool) -> Effect {
    Effect {
        id: id.into(),
        duration,
        kind: EffectKind::Fade(FadeParams {
            fade_in,
            fade_out,
            ..Default::default()
        }),
    }
}

fn grid_fade(id: &str, duration: f64, columns: u32, rows: u32, spacing: u32) -> Effect {
    Effect {
        id: id.into(),
        duration,
        kind: EffectKind::Fade(FadeParams {
            fade_in: true,
            fade_out: false,
            fade_duration: None,
            grid_columns: Some(columns),
            grid_rows: Some(rows),
            spacing: Some(spacing),
        }),
    }
}

fn grid_showcase() -> Template {
    Template {
        id: "grid-showcase-template".into(),
        name: "Grid Showcase".into(),
        description: "First six photos in a 16:9 grid with motion and soft transitions".into(),
        max_photos: 6,
        background_audio: Some(DEFAULT_BACKGROUND_TRACK.into()),
        scenes: vec![
            Scene {
                id: "scene-1-grid-showcase".into(),
                name: "Grid Showcase".into(),
                kind: SceneKind::Grid,
                duration: 8.0,
                max_photos: 6,
                effects: vec![grid_fade("grid-layout", 2.0, 3, 2, 15)],
                order: 1,
            },
            Scene {
                id: "scene-2-individual-showcase".into(),
                name: "Individual Showcase".into(),
                kind: SceneKind::Zoom,
                duration: 4.0,
                max_photos: 6,
                effects: vec![
                    zoom("individual-zoom", 4.0, 1.0, 1.3),
                    fade("smooth-transition", 1.0, true, true),
                ],
                order: 2,
            },
        ],
    }
}

fn cinematic_showcase() -> Template {
    Template {
        id: "cinematic-showcase-template".into(),
        name: "Cinematic Showcase".into(),
        description: "Multi-scene cinematic cut with slow zooms, pans and dramatic grading"
            .into(),
        max_photos: 9,
        background_audio: Some(DEFAULT_BACKGROUND_TRACK.into()),
        scenes: vec![
            Scene {
                id: "scene-1-dramatic-opening".into(),
                name: "Dramatic Opening".into(),
                kind: SceneKind::Fade,
                duration: 5.0,
                max_photos: 2,
                effects: vec![
                    fade("black-fade-in", 2.5, true, false),
                    zoom("hero-zoom", 2.5, 1.5, 1.0),
                    Effect {
                        id: "vignette-effect".into(),
                        duration: 5.0,
                        kind: EffectKind::Vignette(VignetteParams {
                            intensity: 0.3,
                            radius: 0.8,
                        }),
                    },
                ],
                order: 1,
            },
            Scene {
                id: "scene-2-elegant-grid".into(),
                name: "Elegant Grid".into(),
                kind: SceneKind::Grid,
                duration: 8.0,
                max_photos: 9,
                effects: vec![
                    grid_fade("masonry-grid", 3.0, 3, 3, 30),
                    pan("floating-parallax", 5.0, Vec2::new(0.08, -0.06)),
                ],
                order: 2,
            },
            Scene {
                id: "scene-3-cinematic-zoom-sequence".into(),
                name: "Cinematic Zoom Sequence".into(),
                kind: SceneKind::Zoom,
                duration: 12.0,
                max_photos: 6,
                effects: vec![
                    zoom("slow-cinematic-zoom", 8.0, 1.0, 2.0),
                    pan("dramatic-pan", 8.0, Vec2::new(0.2, 0.15)),
                    fade("cinematic-transition", 4.0, true, true),
                ],
                order: 3,
            },
            Scene {
                id: "scene-4-ken-burns-masterpiece".into(),
                name: "Ken Burns Masterpiece".into(),
                kind: SceneKind::KenBurns,
                duration: 10.0,
                max_photos: 5,
                effects: vec![
                    zoom("ken-burns-zoom", 10.0, 1.0, 2.5),
                    pan("ken-burns-pan", 10.0, Vec2::new(0.25, 0.2)),
                    Effect {
                        id: "film-grain".into(),
                        duration: 10.0,
                        kind: EffectKind::Grain(GrainParams {
                            intensity: 0.1,
                            grain_size: 0.5,
                        }),
                    },
                ],
                order: 4,
            },
            Scene {
                id: "scene-5-dynamic-showcase".into(),
                name: "Dynamic Showcase".into(),
                kind: SceneKind::Showcase,
                duration: 8.0,
                max_photos: 4,
                effects: vec![
                    zoom("dynamic-zoom", 4.0, 1.8, 1.0),
                    Effect {
                        id: "color-grading".into(),
                        duration: 8.0,
                        kind: EffectKind::Color(ColorParams {
                            contrast: 1.2,
                            saturation: 1.1,
                            warmth: 0.1,
                        }),
                    },
                    fade("elegant-fade-out", 4.0, false, true),
                ],
                order: 5,
            },
            Scene {
                id: "scene-6-finale".into(),
                name: "Epic Finale".into(),
                kind: SceneKind::Finale,
                duration: 6.0,
                max_photos: 3,
                effects: vec![
                    zoom("epic-zoom", 4.0, 1.2, 1.0),
                    Effect {
                        id: "golden-hour".into(),
                        duration: 6.0,
                        kind: EffectKind::Lighting(LightingParams {
                            lighting_type: Some("golden_hour".into()),
                            intensity: 0.8,
                        }),
                    },
                    fade("epic-fade", 2.0, false, true),
                ],
                order: 6,
            },
        ],
    }
}

fn thumbnail_zoom() -> Template {
    Template {
        id: "thumbnail-zoom-template".into(),
        name: "Thumbnail + Zoom".into(),
        description: "Thumbnail overview first, then a zoom pass over each photo".into(),
        max_photos: 10,
        background_audio: Some(DEFAULT_BACKGROUND_TRACK.into()),
        scenes: vec![
            Scene {
                id: "scene-1-thumbnails".into(),
                name: "Thumbnails Overview".into(),
                kind: SceneKind::Thumbnail,
                duration: 3.0,
                max_photos: 10,
                effects: vec![grid_fade("thumbnails-grid", 1.0, 3, 4, 20)],
                order: 1,
            },
            Scene {
                id: "scene-2-zoom-sequence".into(),
                name: "Zoom Sequence".into(),
                kind: SceneKind::Zoom,
                duration: 6.0,
                max_photos: 10,
                effects: vec![
                    zoom("zoom-effect", 6.0, 1.0, 1.5),
                    pan("pan-effect", 6.0, Vec2::new(0.1, 0.1)),
                ],
                order: 2,
            },
        ],
    }
}

/// All built-in templates, constructed once.
pub fn all() -> &'static [Template] {
    static CATALOG: OnceLock<Vec<Template>> = OnceLock::new();
    CATALOG.get_or_init(|| vec![grid_showcase(), cinematic_showcase(), thumbnail_zoom()])
}

/// Look up a template by id.
pub fn get(template_id: &str) -> Option<&'static Template> {
    all().iter().find(|t| t.id == template_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_templates_validate() {
        for template in all() {
            template.validate().unwrap();
        }
    }

    #[test]
    fn test_lookup_by_id() {
        assert!(get("grid-showcase-template").is_some());
        assert!(get("cinematic-showcase-template").is_some());
        assert!(get("thumbnail-zoom-template").is_some());
        assert!(get("no-such-template").is_none());
    }

    #[test]
    fn test_cinematic_total_duration() {
        let template = get("cinematic-showcase-template").unwrap();
        assert!((template.total_duration() - 49.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_templates_round_trip_through_json() {
        for template in all() {
            let json = serde_json::to_string(template).unwrap();
            let back: Template = serde_json::from_str(&json).unwrap();
            assert_eq!(template, &back);
        }
    }
}
