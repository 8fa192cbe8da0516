//! Backend-agnostic render plan: the typed intermediate representation
//! both rendering backends consume.
//!
//! A plan is an ordered list of segments. Each segment carries resolved
//! photos, a duration, a layout and a set of animation curves; the
//! concatenation of segment durations is the total output duration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::photo::ResolvedPhoto;
use crate::template::{SceneKind, Vec2};

/// Easing applied to an animation curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

impl Easing {
    /// Map linear progress `t` in [0, 1] to eased progress.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// What an animation curve applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveTarget {
    Scale,
    Position,
    Opacity,
    Color,
}

/// Start/end value of a curve: scalar for scale/opacity/color intensity,
/// point for position offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveValue {
    Scalar(f64),
    Point(Vec2),
}

impl CurveValue {
    pub fn as_scalar(&self) -> f64 {
        match self {
            CurveValue::Scalar(v) => *v,
            CurveValue::Point(p) => p.x,
        }
    }

    pub fn as_point(&self) -> Vec2 {
        match self {
            CurveValue::Scalar(v) => Vec2::new(*v, *v),
            CurveValue::Point(p) => *p,
        }
    }
}

/// A single animation curve within a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationCurve {
    pub target: CurveTarget,
    pub start: CurveValue,
    pub end: CurveValue,
    #[serde(default)]
    pub easing: Easing,
    /// Active time window in seconds within the segment; None covers the
    /// whole segment. Fade-in and fade-out become two windowed opacity
    /// curves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<(f64, f64)>,
}

impl AnimationCurve {
    /// Interpolated scalar value at time `t` (seconds into the segment).
    pub fn scalar_at(&self, t: f64, segment_duration: f64) -> f64 {
        let p = self.progress(t, segment_duration);
        let s = self.start.as_scalar();
        let e = self.end.as_scalar();
        s + (e - s) * self.easing.apply(p)
    }

    /// Interpolated point value at time `t` (seconds into the segment).
    pub fn point_at(&self, t: f64, segment_duration: f64) -> Vec2 {
        let p = self.progress(t, segment_duration);
        let eased = self.easing.apply(p);
        let s = self.start.as_point();
        let e = self.end.as_point();
        Vec2::new(s.x + (e.x - s.x) * eased, s.y + (e.y - s.y) * eased)
    }

    fn progress(&self, t: f64, segment_duration: f64) -> f64 {
        let (begin, end) = self.window.unwrap_or((0.0, segment_duration));
        if end <= begin {
            return 1.0;
        }
        ((t - begin) / (end - begin)).clamp(0.0, 1.0)
    }
}

/// How a segment lays its photos out on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One photo, full frame, letterboxed.
    Single,
    /// columns x rows cell grid; each cell letterboxed independently.
    Grid { columns: u32, rows: u32 },
}

impl Layout {
    /// Number of photo slots this layout exposes.
    pub fn slots(&self) -> usize {
        match self {
            Layout::Single => 1,
            Layout::Grid { columns, rows } => (*columns as usize) * (*rows as usize),
        }
    }
}

/// One atomic unit of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSegment {
    /// Id of the scene this segment was derived from.
    pub scene_id: String,
    pub scene_kind: SceneKind,
    /// At least one resolved photo; grid segments carry one per cell used.
    pub photos: Vec<ResolvedPhoto>,
    /// Segment duration in seconds.
    pub duration: f64,
    pub layout: Layout,
    #[serde(default)]
    pub curves: Vec<AnimationCurve>,
}

impl RenderSegment {
    /// First curve with the given target, if any.
    pub fn curve(&self, target: CurveTarget) -> Option<&AnimationCurve> {
        self.curves.iter().find(|c| c.target == target)
    }

    /// All curves with the given target.
    pub fn curves_for(&self, target: CurveTarget) -> impl Iterator<Item = &AnimationCurve> {
        self.curves.iter().filter(move |c| c.target == target)
    }
}

/// Background audio attached to the concatenated timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Local path of the track, exists at plan time.
    pub path: PathBuf,
    /// Attenuation factor so the track sits under foreground sound.
    pub volume: f64,
    /// Fade-in/out length in seconds (applied symmetrically).
    pub fade: f64,
    /// Loop the track by repeated concatenation when shorter than the
    /// video; always trimmed to exact video length.
    pub loop_to_fit: bool,
}

/// The complete unit of work handed to a rendering backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub segments: Vec<RenderSegment>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioTrack>,
}

impl RenderPlan {
    /// Total output duration: the sum of all segment durations.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Drop the audio track (used by the audio-less encode retry).
    pub fn without_audio(&self) -> RenderPlan {
        RenderPlan {
            audio: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoOrigin;

    fn photo() -> ResolvedPhoto {
        ResolvedPhoto::new("/tmp/p.jpg", PhotoOrigin::Local, 1)
    }

    fn segment(duration: f64) -> RenderSegment {
        RenderSegment {
            scene_id: "s".into(),
            scene_kind: SceneKind::Zoom,
            photos: vec![photo()],
            duration,
            layout: Layout::Single,
            curves: vec![],
        }
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
        ] {
            assert!((easing.apply(0.0)).abs() < 1e-9);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_curve_scalar_interpolation() {
        let curve = AnimationCurve {
            target: CurveTarget::Scale,
            start: CurveValue::Scalar(1.0),
            end: CurveValue::Scalar(2.0),
            easing: Easing::Linear,
            window: None,
        };

        assert!((curve.scalar_at(0.0, 4.0) - 1.0).abs() < 1e-9);
        assert!((curve.scalar_at(2.0, 4.0) - 1.5).abs() < 1e-9);
        assert!((curve.scalar_at(4.0, 4.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_windowed_curve_clamps_outside_window() {
        let fade_in = AnimationCurve {
            target: CurveTarget::Opacity,
            start: CurveValue::Scalar(0.0),
            end: CurveValue::Scalar(1.0),
            easing: Easing::Linear,
            window: Some((0.0, 1.0)),
        };

        assert!((fade_in.scalar_at(0.5, 8.0) - 0.5).abs() < 1e-9);
        // Past the window the value holds at the end value.
        assert!((fade_in.scalar_at(4.0, 8.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_total_duration_is_segment_sum() {
        let plan = RenderPlan {
            segments: vec![segment(8.0), segment(2.0), segment(2.0)],
            width: 1920,
            height: 1080,
            fps: 30,
            audio: None,
        };

        assert!((plan.total_duration() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_without_audio_strips_track_only() {
        let plan = RenderPlan {
            segments: vec![segment(1.0)],
            width: 1280,
            height: 720,
            fps: 24,
            audio: Some(AudioTrack {
                path: "/tmp/a.mp3".into(),
                volume: 0.3,
                fade: 2.0,
                loop_to_fit: true,
            }),
        };

        let stripped = plan.without_audio();
        assert!(stripped.audio.is_none());
        assert_eq!(stripped.segments, plan.segments);
    }

    #[test]
    fn test_grid_layout_slots() {
        assert_eq!(Layout::Single.slots(), 1);
        assert_eq!(Layout::Grid { columns: 3, rows: 2 }.slots(), 6);
    }
}
