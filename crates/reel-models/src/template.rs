//! Template schema: Template -> Scene -> Effect.
//!
//! Templates are static, validated data. Effect parameters arrive as
//! free-form JSON maps but are modeled here as typed per-kind structs;
//! unknown parameter keys are ignored on deserialization so template
//! definitions can grow without breaking older engines.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised when validating a template definition.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' has no scenes")]
    NoScenes(String),

    #[error("scene '{scene}' has non-positive duration {duration}")]
    BadDuration { scene: String, duration: f64 },

    #[error("scene '{0}' has max_photos == 0")]
    ZeroCapacity(String),
}

/// A normalized 2-D offset, fractions of the frame size in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Vec2 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Scene kind, drives segment construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    Grid,
    Zoom,
    Fade,
    KenBurns,
    Showcase,
    Finale,
    Slideshow,
    Thumbnail,
}

impl SceneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneKind::Grid => "grid",
            SceneKind::Zoom => "zoom",
            SceneKind::Fade => "fade",
            SceneKind::KenBurns => "ken_burns",
            SceneKind::Showcase => "showcase",
            SceneKind::Finale => "finale",
            SceneKind::Slideshow => "slideshow",
            SceneKind::Thumbnail => "thumbnail",
        }
    }

    /// Grid-style kinds render all allocated photos in one segment.
    pub fn is_grid(&self) -> bool {
        matches!(self, SceneKind::Grid | SceneKind::Thumbnail)
    }
}

impl std::fmt::Display for SceneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zoom effect parameters (scale factor over the segment).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ZoomParams {
    #[serde(default = "default_zoom_start")]
    pub zoom_start: f64,
    #[serde(default = "default_zoom_end")]
    pub zoom_end: f64,
}

fn default_zoom_start() -> f64 {
    1.0
}
fn default_zoom_end() -> f64 {
    1.3
}

impl Default for ZoomParams {
    fn default() -> Self {
        Self {
            zoom_start: default_zoom_start(),
            zoom_end: default_zoom_end(),
        }
    }
}

/// Pan effect parameters (position offset over the segment).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PanParams {
    #[serde(default)]
    pub pan_start: Vec2,
    #[serde(default)]
    pub pan_end: Vec2,
}

/// Fade effect parameters.
///
/// The grid fields ride along on fade effects in the shipped templates
/// (the layout-bearing effect of grid scenes), so they are modeled here
/// rather than as a separate effect kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FadeParams {
    #[serde(default = "default_true")]
    pub fade_in: bool,
    #[serde(default)]
    pub fade_out: bool,
    /// Explicit fade length in seconds; capped to duration/4 by the planner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_columns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl Default for FadeParams {
    fn default() -> Self {
        Self {
            fade_in: true,
            fade_out: false,
            fade_duration: None,
            grid_columns: None,
            grid_rows: None,
            spacing: None,
        }
    }
}

/// Vignette effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VignetteParams {
    #[serde(default = "default_vignette_intensity")]
    pub intensity: f64,
    #[serde(default = "default_vignette_radius")]
    pub radius: f64,
}

fn default_vignette_intensity() -> f64 {
    0.3
}
fn default_vignette_radius() -> f64 {
    0.8
}

impl Default for VignetteParams {
    fn default() -> Self {
        Self {
            intensity: default_vignette_intensity(),
            radius: default_vignette_radius(),
        }
    }
}

/// Glow effect parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GlowParams {
    #[serde(default = "default_glow_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_glow_intensity() -> f64 {
    0.15
}

impl Default for GlowParams {
    fn default() -> Self {
        Self {
            intensity: default_glow_intensity(),
            color: None,
        }
    }
}

/// Color grading parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColorParams {
    #[serde(default = "default_contrast")]
    pub contrast: f64,
    #[serde(default = "default_saturation")]
    pub saturation: f64,
    #[serde(default)]
    pub warmth: f64,
}

fn default_contrast() -> f64 {
    1.1
}
fn default_saturation() -> f64 {
    1.1
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            contrast: default_contrast(),
            saturation: default_saturation(),
            warmth: 0.0,
        }
    }
}

/// Lighting effect parameters (e.g. golden-hour warm cast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LightingParams {
    #[serde(default)]
    pub lighting_type: Option<String>,
    #[serde(default = "default_lighting_intensity")]
    pub intensity: f64,
}

fn default_lighting_intensity() -> f64 {
    0.8
}

impl Default for LightingParams {
    fn default() -> Self {
        Self {
            lighting_type: None,
            intensity: default_lighting_intensity(),
        }
    }
}

/// Film grain parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GrainParams {
    #[serde(default = "default_grain_intensity")]
    pub intensity: f64,
    #[serde(default = "default_grain_size")]
    pub grain_size: f64,
}

fn default_grain_intensity() -> f64 {
    0.1
}
fn default_grain_size() -> f64 {
    0.5
}

impl Default for GrainParams {
    fn default() -> Self {
        Self {
            intensity: default_grain_intensity(),
            grain_size: default_grain_size(),
        }
    }
}

/// Blur parameters (depth-of-field style ramp).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BlurParams {
    #[serde(default)]
    pub blur_start: f64,
    #[serde(default)]
    pub blur_end: f64,
}

/// Slide/wind motion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideParams {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default = "default_slide_intensity")]
    pub intensity: f64,
}

fn default_slide_intensity() -> f64 {
    0.1
}

impl Default for SlideParams {
    fn default() -> Self {
        Self {
            direction: None,
            intensity: default_slide_intensity(),
        }
    }
}

/// Typed per-kind effect parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectKind {
    Zoom(ZoomParams),
    Pan(PanParams),
    Fade(FadeParams),
    Vignette(VignetteParams),
    Glow(GlowParams),
    Color(ColorParams),
    Lighting(LightingParams),
    Grain(GrainParams),
    Blur(BlurParams),
    Slide(SlideParams),
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Zoom(_) => "zoom",
            EffectKind::Pan(_) => "pan",
            EffectKind::Fade(_) => "fade",
            EffectKind::Vignette(_) => "vignette",
            EffectKind::Glow(_) => "glow",
            EffectKind::Color(_) => "color",
            EffectKind::Lighting(_) => "lighting",
            EffectKind::Grain(_) => "grain",
            EffectKind::Blur(_) => "blur",
            EffectKind::Slide(_) => "slide",
        }
    }
}

/// A parameterized visual transformation applied within a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEffect", into = "RawEffect")]
pub struct Effect {
    pub id: String,
    /// Nominal effect duration in seconds.
    pub duration: f64,
    pub kind: EffectKind,
}

/// Wire form of an effect: kind tag + free-form parameter map.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEffect {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    parameters: Map<String, Value>,
}

impl TryFrom<RawEffect> for Effect {
    type Error = String;

    fn try_from(raw: RawEffect) -> Result<Self, Self::Error> {
        let params = Value::Object(raw.parameters);
        // serde_json ignores unknown keys by default, which gives the
        // "unknown parameters ignored" forward-compatibility policy.
        let kind = match raw.kind.as_str() {
            "zoom" => EffectKind::Zoom(from_params(params)?),
            "pan" => EffectKind::Pan(from_params(params)?),
            "fade" => EffectKind::Fade(from_params(params)?),
            "vignette" => EffectKind::Vignette(from_params(params)?),
            "glow" => EffectKind::Glow(from_params(params)?),
            "color" => EffectKind::Color(from_params(params)?),
            "lighting" => EffectKind::Lighting(from_params(params)?),
            "grain" => EffectKind::Grain(from_params(params)?),
            "blur" => EffectKind::Blur(from_params(params)?),
            "slide" => EffectKind::Slide(from_params(params)?),
            other => return Err(format!("unknown effect type '{other}'")),
        };

        Ok(Effect {
            id: raw.id,
            duration: raw.duration,
            kind,
        })
    }
}

fn from_params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

impl From<Effect> for RawEffect {
    fn from(effect: Effect) -> Self {
        let (kind, params) = match &effect.kind {
            EffectKind::Zoom(p) => ("zoom", serde_json::to_value(p)),
            EffectKind::Pan(p) => ("pan", serde_json::to_value(p)),
            EffectKind::Fade(p) => ("fade", serde_json::to_value(p)),
            EffectKind::Vignette(p) => ("vignette", serde_json::to_value(p)),
            EffectKind::Glow(p) => ("glow", serde_json::to_value(p)),
            EffectKind::Color(p) => ("color", serde_json::to_value(p)),
            EffectKind::Lighting(p) => ("lighting", serde_json::to_value(p)),
            EffectKind::Grain(p) => ("grain", serde_json::to_value(p)),
            EffectKind::Blur(p) => ("blur", serde_json::to_value(p)),
            EffectKind::Slide(p) => ("slide", serde_json::to_value(p)),
        };

        let parameters = match params {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        RawEffect {
            id: effect.id,
            kind: kind.to_string(),
            duration: effect.duration,
            parameters,
        }
    }
}

/// A time-boxed unit of a template with a kind, duration, photo
/// capacity and effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SceneKind,
    /// Scene duration in seconds, > 0.
    pub duration: f64,
    /// Photo capacity of this scene, >= 1.
    pub max_photos: u32,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Deterministic sequencing index.
    pub order: u32,
}

impl Scene {
    /// Grid layout declared by this scene's layout-bearing effect.
    ///
    /// Returns (columns, rows); defaults to 3x2 when no effect declares one.
    pub fn grid_layout(&self) -> (u32, u32) {
        for effect in &self.effects {
            if let EffectKind::Fade(fade) = &effect.kind {
                if let (Some(cols), Some(rows)) = (fade.grid_columns, fade.grid_rows) {
                    return (cols.max(1), rows.max(1));
                }
            }
        }
        (3, 2)
    }

    /// First zoom effect parameters, if any.
    pub fn zoom(&self) -> Option<&ZoomParams> {
        self.effects.iter().find_map(|e| match &e.kind {
            EffectKind::Zoom(p) => Some(p),
            _ => None,
        })
    }

    /// First pan effect parameters, if any.
    pub fn pan(&self) -> Option<&PanParams> {
        self.effects.iter().find_map(|e| match &e.kind {
            EffectKind::Pan(p) => Some(p),
            _ => None,
        })
    }

    /// First fade effect parameters, if any.
    pub fn fade(&self) -> Option<&FadeParams> {
        self.effects.iter().find_map(|e| match &e.kind {
            EffectKind::Fade(p) => Some(p),
            _ => None,
        })
    }

    /// First color grading parameters, if any.
    pub fn color(&self) -> Option<&ColorParams> {
        self.effects.iter().find_map(|e| match &e.kind {
            EffectKind::Color(p) => Some(p),
            _ => None,
        })
    }
}

/// A named, ordered sequence of scenes defining a video's structure.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scenes: Vec<Scene>,
    /// Maximum photo count this template accepts.
    pub max_photos: u32,
    /// Background audio track name, resolved against the assets directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_audio: Option<String>,
}

impl Template {
    /// Total planned output duration: the sum of scene durations,
    /// independent of photo count.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }

    /// Scenes in `order` sequence.
    pub fn ordered_scenes(&self) -> Vec<&Scene> {
        let mut scenes: Vec<&Scene> = self.scenes.iter().collect();
        scenes.sort_by_key(|s| s.order);
        scenes
    }

    /// Validate structural invariants of a template definition.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.scenes.is_empty() {
            return Err(TemplateError::NoScenes(self.id.clone()));
        }
        for scene in &self.scenes {
            if scene.duration <= 0.0 {
                return Err(TemplateError::BadDuration {
                    scene: scene.id.clone(),
                    duration: scene.duration,
                });
            }
            if scene.max_photos == 0 {
                return Err(TemplateError::ZeroCapacity(scene.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_parsing_ignores_unknown_parameters() {
        let json = serde_json::json!({
            "id": "hero-zoom",
            "type": "zoom",
            "duration": 2.5,
            "parameters": {
                "zoom_start": 1.5,
                "zoom_end": 1.0,
                "slow_motion": true,
                "hero_effect": true
            }
        });

        let effect: Effect = serde_json::from_value(json).unwrap();
        match effect.kind {
            EffectKind::Zoom(p) => {
                assert!((p.zoom_start - 1.5).abs() < f64::EPSILON);
                assert!((p.zoom_end - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("expected zoom, got {:?}", other),
        }
    }

    #[test]
    fn test_effect_parsing_defaults_missing_parameters() {
        let json = serde_json::json!({
            "id": "plain-fade",
            "type": "fade",
            "duration": 1.0,
            "parameters": {}
        });

        let effect: Effect = serde_json::from_value(json).unwrap();
        match effect.kind {
            EffectKind::Fade(p) => {
                assert!(p.fade_in);
                assert!(p.fade_duration.is_none());
            }
            other => panic!("expected fade, got {:?}", other),
        }
    }

    #[test]
    fn test_effect_rejects_unknown_kind() {
        let json = serde_json::json!({
            "id": "x",
            "type": "hologram",
            "duration": 1.0,
            "parameters": {}
        });

        assert!(serde_json::from_value::<Effect>(json).is_err());
    }

    #[test]
    fn test_grid_layout_from_fade_effect() {
        let scene = Scene {
            id: "s1".into(),
            name: "Grid".into(),
            kind: SceneKind::Grid,
            duration: 8.0,
            max_photos: 6,
            effects: vec![Effect {
                id: "grid-layout".into(),
                duration: 2.0,
                kind: EffectKind::Fade(FadeParams {
                    grid_columns: Some(4),
                    grid_rows: Some(3),
                    ..Default::default()
                }),
            }],
            order: 1,
        };

        assert_eq!(scene.grid_layout(), (4, 3));
    }

    #[test]
    fn test_grid_layout_defaults_to_3x2() {
        let scene = Scene {
            id: "s1".into(),
            name: "Grid".into(),
            kind: SceneKind::Grid,
            duration: 8.0,
            max_photos: 6,
            effects: vec![],
            order: 1,
        };

        assert_eq!(scene.grid_layout(), (3, 2));
    }

    #[test]
    fn test_template_validation() {
        let template = Template {
            id: "t".into(),
            name: "T".into(),
            description: String::new(),
            scenes: vec![],
            max_photos: 6,
            background_audio: None,
        };

        assert!(matches!(
            template.validate(),
            Err(TemplateError::NoScenes(_))
        ));
    }
}
