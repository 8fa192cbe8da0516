//! Clip-compositing rendering backend.
//!
//! Builds an in-memory clip per segment (letterboxed stills composed
//! onto a black background), rasterizes every output frame by sampling
//! the segment's animation curves, and streams the frames into the
//! raw-frame encoder sink. Audio is attached at the sink.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{imageops, Rgba, RgbaImage};
use tracing::{debug, info};

use reel_media::{MediaError, RawFrameSink, RawFrameSinkOpts, SinkAudio};
use reel_models::{AnimationCurve, BackendKind, CurveTarget, Layout, RenderPlan, RenderSegment, Vec2};

use crate::backend::{BackendContext, ProgressFn, RenderBackend, RenderOutcome};
use crate::error::{EngineError, EngineResult};

/// Report encoder progress every this many frames.
const PROGRESS_FRAME_STRIDE: u64 = 8;

/// Backend that composites frames in-process and streams them to the
/// encoder sink.
pub struct ClipCompositorBackend {
    ctx: BackendContext,
}

impl ClipCompositorBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }

    fn check_cancelled(&self) -> EngineResult<()> {
        if let Some(rx) = &self.ctx.cancel_rx {
            if *rx.borrow() {
                return Err(EngineError::Media(MediaError::Cancelled));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RenderBackend for ClipCompositorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ClipCompositor
    }

    async fn render(
        &self,
        plan: &RenderPlan,
        output: &Path,
        progress: ProgressFn,
    ) -> EngineResult<RenderOutcome> {
        let (width, height) = (plan.width, plan.height);
        let total = plan.total_duration();

        // Decode and letterbox all stills off the async runtime.
        let segments = plan.segments.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            segments
                .iter()
                .map(|segment| prepare_segment(segment, width, height))
                .collect::<EngineResult<Vec<PreparedClip>>>()
        })
        .await
        .map_err(|e| EngineError::encode_failed(format!("clip preparation panicked: {e}")))??;

        let total_frames: u64 = prepared.iter().map(|c| c.frames(plan.fps)).sum();
        info!(
            segments = prepared.len(),
            total_frames,
            audio = plan.audio.is_some(),
            "Starting clip-compositing encode"
        );

        let mut sink = RawFrameSink::new(RawFrameSinkOpts {
            output: output.to_path_buf(),
            width,
            height,
            fps: plan.fps,
            total_duration: total,
            preset: self.ctx.preset,
            audio: plan.audio.as_ref().map(|a| SinkAudio {
                path: a.path.clone(),
                volume: a.volume,
                fade: a.fade,
                loop_to_fit: a.loop_to_fit,
            }),
        });
        sink.begin().await?;

        let mut frames_done: u64 = 0;
        for clip in &prepared {
            let frames = clip.frames(plan.fps);
            for i in 0..frames {
                if i % PROGRESS_FRAME_STRIDE == 0 {
                    self.check_cancelled()?;
                }

                let t = (i as f64 + 0.5) / plan.fps as f64;
                let frame = clip.frame_at(t);
                sink.push_frame(frame.as_raw()).await?;

                frames_done += 1;
                if frames_done % PROGRESS_FRAME_STRIDE == 0 || frames_done == total_frames {
                    progress(frames_done as f64 / total_frames as f64);
                }
            }
        }

        sink.finish().await?;

        Ok(RenderOutcome {
            duration: total,
            with_audio: plan.audio.is_some(),
        })
    }
}

/// A segment reduced to a static composed frame plus its curves.
struct PreparedClip {
    base: RgbaImage,
    duration: f64,
    curves: Vec<AnimationCurve>,
    animated: bool,
}

impl PreparedClip {
    fn frames(&self, fps: u32) -> u64 {
        ((self.duration * fps as f64).round() as u64).max(1)
    }

    /// Rasterize the frame at `t` seconds into the clip.
    fn frame_at(&self, t: f64) -> RgbaImage {
        let mut frame = if self.animated {
            apply_zoom_pan(&self.base, self.curves.as_slice(), t, self.duration)
        } else {
            self.base.clone()
        };

        let opacity = opacity_at(&self.curves, t, self.duration);
        if opacity < 1.0 {
            apply_opacity(&mut frame, opacity);
        }

        frame
    }
}

/// Build the static composed frame for a segment.
fn prepare_segment(segment: &RenderSegment, width: u32, height: u32) -> EngineResult<PreparedClip> {
    let base = match segment.layout {
        Layout::Grid { columns, rows } if segment.photos.len() > 1 => {
            compose_grid(segment, width, height, columns, rows)?
        }
        _ => {
            let photo = segment.photos.first().ok_or_else(|| {
                EngineError::encode_failed(format!("segment {} has no photos", segment.scene_id))
            })?;
            let img = image::open(&photo.path)
                .map_err(|e| MediaError::image_failed(&photo.path, e.to_string()))?;
            letterbox(&img.to_rgba8(), width, height)
        }
    };

    let mut base = base;
    if let Some(color) = segment.curve(CurveTarget::Color) {
        // Static grading: map the contrast multiplier to the percentage
        // adjustment the image crate expects.
        let adjustment = ((color.start.as_scalar() - 1.0) * 100.0) as f32;
        base = imageops::contrast(&base, adjustment);
    }

    let animated = segment.curve(CurveTarget::Scale).is_some()
        || segment.curve(CurveTarget::Position).is_some();

    debug!(
        scene = %segment.scene_id,
        animated,
        "Prepared clip ({} photos)", segment.photos.len()
    );

    Ok(PreparedClip {
        base,
        duration: segment.duration,
        curves: segment.curves.clone(),
        animated,
    })
}

/// Letterbox an image into a width x height black frame.
fn letterbox(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (iw, ih) = img.dimensions();
    let ratio = (width as f64 / iw as f64).min(height as f64 / ih as f64);
    let scaled_w = ((iw as f64 * ratio) as u32).max(1);
    let scaled_h = ((ih as f64 * ratio) as u32).max(1);

    let scaled = imageops::resize(img, scaled_w, scaled_h, FilterType::Lanczos3);
    let mut frame = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let x = (width - scaled_w) / 2;
    let y = (height - scaled_h) / 2;
    imageops::overlay(&mut frame, &scaled, x as i64, y as i64);
    frame
}

/// Compose grid cells onto a black frame, each cell letterboxed.
fn compose_grid(
    segment: &RenderSegment,
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
) -> EngineResult<RgbaImage> {
    let columns = columns.max(1);
    let rows = rows.max(1);
    let cell_w = width / columns;
    let cell_h = height / rows;

    let mut frame = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));

    for (i, photo) in segment
        .photos
        .iter()
        .take((columns * rows) as usize)
        .enumerate()
    {
        let img = image::open(&photo.path)
            .map_err(|e| MediaError::image_failed(&photo.path, e.to_string()))?;
        let cell = letterbox(&img.to_rgba8(), cell_w, cell_h);

        let col = i as u32 % columns;
        let row = i as u32 / columns;
        imageops::overlay(
            &mut frame,
            &cell,
            (col * cell_w) as i64,
            (row * cell_h) as i64,
        );
    }

    Ok(frame)
}

/// Crop region for the zoom/pan state at time `t`.
///
/// Mirrors the filter-graph backend's zoompan: the viewport shrinks by
/// the scale factor and the pan offset shifts its center by fractions of
/// the frame size, clamped inside the frame.
fn zoom_viewport(
    width: u32,
    height: u32,
    scale: f64,
    pan: Vec2,
) -> (u32, u32, u32, u32) {
    let scale = scale.max(1.0);
    let crop_w = ((width as f64 / scale) as u32).max(1);
    let crop_h = ((height as f64 / scale) as u32).max(1);

    let x = width as f64 / 2.0 - crop_w as f64 / 2.0 + pan.x * width as f64;
    let y = height as f64 / 2.0 - crop_h as f64 / 2.0 + pan.y * height as f64;

    let x = (x.max(0.0) as u32).min(width - crop_w);
    let y = (y.max(0.0) as u32).min(height - crop_h);

    (x, y, crop_w, crop_h)
}

/// Apply the scale/position curves by cropping and rescaling the base.
fn apply_zoom_pan(
    base: &RgbaImage,
    curves: &[AnimationCurve],
    t: f64,
    duration: f64,
) -> RgbaImage {
    let (width, height) = base.dimensions();

    let scale = curves
        .iter()
        .find(|c| c.target == CurveTarget::Scale)
        .map(|c| c.scalar_at(t, duration))
        .unwrap_or(1.0);
    let pan = curves
        .iter()
        .find(|c| c.target == CurveTarget::Position)
        .map(|c| c.point_at(t, duration))
        .unwrap_or(Vec2::ZERO);

    if scale <= 1.0 && pan.x == 0.0 && pan.y == 0.0 {
        return base.clone();
    }

    let (x, y, crop_w, crop_h) = zoom_viewport(width, height, scale, pan);
    let cropped = imageops::crop_imm(base, x, y, crop_w, crop_h).to_image();
    // Triangle keeps per-frame cost bounded; quality is recovered by the
    // encoder working at full frame size.
    imageops::resize(&cropped, width, height, FilterType::Triangle)
}

/// Combined opacity of all windowed opacity curves at time `t`.
fn opacity_at(curves: &[AnimationCurve], t: f64, duration: f64) -> f64 {
    curves
        .iter()
        .filter(|c| c.target == CurveTarget::Opacity)
        .map(|c| c.scalar_at(t, duration))
        .fold(1.0, |acc, v| acc * v.clamp(0.0, 1.0))
}

/// Multiply a frame toward black (composite over the black background).
fn apply_opacity(frame: &mut RgbaImage, opacity: f64) {
    let factor = (opacity.clamp(0.0, 1.0) * 256.0) as u32;
    for pixel in frame.pixels_mut() {
        pixel[0] = ((pixel[0] as u32 * factor) >> 8) as u8;
        pixel[1] = ((pixel[1] as u32 * factor) >> 8) as u8;
        pixel[2] = ((pixel[2] as u32 * factor) >> 8) as u8;
        pixel[3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{CurveValue, Easing, PhotoOrigin, ResolvedPhoto, SceneKind};
    use tempfile::TempDir;

    fn write_photo(dir: &Path, name: &str, w: u32, h: u32) -> ResolvedPhoto {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, 255]))
            .save(&path)
            .unwrap();
        ResolvedPhoto::new(path, PhotoOrigin::Local, 1)
    }

    #[test]
    fn test_letterbox_preserves_aspect_and_fills_frame() {
        let img = RgbaImage::from_pixel(400, 400, Rgba([255, 255, 255, 255]));
        let frame = letterbox(&img, 1280, 720);

        assert_eq!(frame.dimensions(), (1280, 720));
        // Square image in 16:9 frame: black pillarbox columns at the sides.
        assert_eq!(frame.get_pixel(0, 360), &Rgba([0, 0, 0, 255]));
        assert_eq!(frame.get_pixel(640, 360), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_zoom_viewport_centered_without_pan() {
        let (x, y, w, h) = zoom_viewport(1280, 720, 2.0, Vec2::ZERO);
        assert_eq!((w, h), (640, 360));
        assert_eq!((x, y), (320, 180));
    }

    #[test]
    fn test_zoom_viewport_clamps_pan_inside_frame() {
        let (x, y, w, h) = zoom_viewport(1280, 720, 2.0, Vec2::new(1.0, 1.0));
        assert_eq!((w, h), (640, 360));
        assert_eq!((x, y), (640, 360));
    }

    #[test]
    fn test_opacity_fades_in_and_out() {
        let curves = vec![
            AnimationCurve {
                target: CurveTarget::Opacity,
                start: CurveValue::Scalar(0.0),
                end: CurveValue::Scalar(1.0),
                easing: Easing::Linear,
                window: Some((0.0, 1.0)),
            },
            AnimationCurve {
                target: CurveTarget::Opacity,
                start: CurveValue::Scalar(1.0),
                end: CurveValue::Scalar(0.0),
                easing: Easing::Linear,
                window: Some((3.0, 4.0)),
            },
        ];

        assert!((opacity_at(&curves, 0.5, 4.0) - 0.5).abs() < 1e-9);
        assert!((opacity_at(&curves, 2.0, 4.0) - 1.0).abs() < 1e-9);
        assert!((opacity_at(&curves, 3.5, 4.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_prepare_grid_segment_composes_cells() {
        let dir = TempDir::new().unwrap();
        let segment = RenderSegment {
            scene_id: "grid".into(),
            scene_kind: SceneKind::Grid,
            photos: (0..4)
                .map(|i| write_photo(dir.path(), &format!("p{i}.png"), 200, 200))
                .collect(),
            duration: 8.0,
            layout: Layout::Grid { columns: 2, rows: 2 },
            curves: vec![],
        };

        let clip = prepare_segment(&segment, 1280, 720).unwrap();
        assert_eq!(clip.base.dimensions(), (1280, 720));
        assert!(!clip.animated);
        assert_eq!(clip.frames(24), 192);
    }

    #[test]
    fn test_prepare_single_segment_with_zoom_is_animated() {
        let dir = TempDir::new().unwrap();
        let segment = RenderSegment {
            scene_id: "zoom".into(),
            scene_kind: SceneKind::Zoom,
            photos: vec![write_photo(dir.path(), "p.png", 600, 400)],
            duration: 4.0,
            layout: Layout::Single,
            curves: vec![AnimationCurve {
                target: CurveTarget::Scale,
                start: CurveValue::Scalar(1.0),
                end: CurveValue::Scalar(1.5),
                easing: Easing::EaseInOut,
                window: None,
            }],
        };

        let clip = prepare_segment(&segment, 1280, 720).unwrap();
        assert!(clip.animated);

        let first = clip.frame_at(0.0);
        let last = clip.frame_at(4.0);
        assert_eq!(first.dimensions(), (1280, 720));
        assert_eq!(last.dimensions(), (1280, 720));
    }

    #[test]
    fn test_frame_buffer_length_matches_dimensions() {
        let dir = TempDir::new().unwrap();
        let segment = RenderSegment {
            scene_id: "s".into(),
            scene_kind: SceneKind::Slideshow,
            photos: vec![write_photo(dir.path(), "p.png", 320, 240)],
            duration: 2.0,
            layout: Layout::Single,
            curves: vec![],
        };

        let clip = prepare_segment(&segment, 640, 360).unwrap();
        let frame = clip.frame_at(1.0);
        assert_eq!(frame.as_raw().len(), 640 * 360 * 4);
    }
}
