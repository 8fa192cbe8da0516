//! Filter-graph rendering backend.
//!
//! Derives a single external-encoder invocation from the render plan:
//! one looped image input per photo slot, a per-segment filter chain
//! (letterbox scale/pad, zoompan animation, fades, grading), grid cells
//! composed with hstack/vstack, all segments concatenated, and the audio
//! track mixed in with loop/volume/fade filtering.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use reel_media::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use reel_models::encoding::DEFAULT_AUDIO_BITRATE;
use reel_models::{BackendKind, CurveTarget, Layout, RenderPlan, RenderSegment};

use crate::backend::{BackendContext, ProgressFn, RenderBackend, RenderOutcome};
use crate::error::{EngineError, EngineResult};

/// Backend that renders by executing an external encoder process.
pub struct FilterGraphBackend {
    ctx: BackendContext,
}

impl FilterGraphBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl RenderBackend for FilterGraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FilterGraph
    }

    async fn render(
        &self,
        plan: &RenderPlan,
        output: &Path,
        progress: ProgressFn,
    ) -> EngineResult<RenderOutcome> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = build_command(plan, output, &self.ctx)?;
        let total_ms = (plan.total_duration() * 1000.0) as i64;

        let mut runner = FfmpegRunner::new().with_timeout(self.ctx.encode_timeout.as_secs());
        if let Some(cancel) = &self.ctx.cancel_rx {
            runner = runner.with_cancel(cancel.clone());
        }

        info!(
            segments = plan.segments.len(),
            audio = plan.audio.is_some(),
            "Starting filter-graph encode"
        );

        let progress_cb = Arc::clone(&progress);
        runner
            .run_with_progress(&cmd, move |p| progress_cb(p.fraction(total_ms)))
            .await?;

        // The process exiting zero is not enough; the container must exist.
        let produced = tokio::fs::metadata(output).await;
        match produced {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Err(EngineError::OutputMissing(output.display().to_string())),
        }

        // Report the container's actual duration when probing works.
        let duration = reel_media::get_duration(output)
            .await
            .unwrap_or_else(|_| plan.total_duration());

        Ok(RenderOutcome {
            duration,
            with_audio: plan.audio.is_some(),
        })
    }
}

/// Derive the full encoder command for a plan.
pub(crate) fn build_command(
    plan: &RenderPlan,
    output: &Path,
    ctx: &BackendContext,
) -> EngineResult<FfmpegCommand> {
    if plan.segments.is_empty() {
        return Err(EngineError::encode_failed("render plan has no segments"));
    }

    let mut cmd = FfmpegCommand::new(output);
    let mut filters: Vec<String> = Vec::new();
    let mut input_index = 0usize;

    // One looped image input per photo slot, bounded to its segment's
    // duration so every filter chain sees a finite stream.
    for (seg_index, segment) in plan.segments.iter().enumerate() {
        for photo in &segment.photos {
            cmd = cmd.input(
                FfmpegInput::from_path(&photo.path).args([
                    "-loop".to_string(),
                    "1".to_string(),
                    "-framerate".to_string(),
                    plan.fps.to_string(),
                    "-t".to_string(),
                    format!("{:.3}", segment.duration),
                ]),
            );
        }

        filters.extend(segment_filters(segment, seg_index, input_index, plan));
        input_index += segment.photos.len();
    }

    // Concatenate all segments.
    let seg_labels: String = (0..plan.segments.len()).map(|i| format!("[s{i}]")).collect();
    filters.push(format!(
        "{}concat=n={}:v=1:a=0[vout]",
        seg_labels,
        plan.segments.len()
    ));

    let total = plan.total_duration();

    if let Some(audio) = &plan.audio {
        let mut audio_input = FfmpegInput::from_path(&audio.path);
        if audio.loop_to_fit {
            audio_input = audio_input.args(["-stream_loop", "-1"]);
        }
        cmd = cmd.input(audio_input);

        let fade = audio.fade.max(0.0);
        let fade_out_start = (total - fade).max(0.0);
        filters.push(format!(
            "[{input_index}:a]volume={:.2},afade=t=in:st=0:d={:.2},afade=t=out:st={:.2}:d={:.2},atrim=0:{:.3},asetpts=PTS-STARTPTS[aout]",
            audio.volume, fade, fade_out_start, fade, total
        ));
    }

    let filter_graph = filters.join(";");
    debug!("Filter graph: {}", filter_graph);

    cmd = cmd.filter_complex(filter_graph).map("[vout]");
    if plan.audio.is_some() {
        cmd = cmd
            .map("[aout]")
            .audio_codec("aac")
            .audio_bitrate(DEFAULT_AUDIO_BITRATE);
    }

    cmd = cmd
        .fps(plan.fps)
        .video_codec("libx264")
        .output_args(ctx.preset.to_ffmpeg_args())
        .duration(total);

    Ok(cmd)
}

/// Filter chains producing label `[s{seg_index}]` for one segment.
fn segment_filters(
    segment: &RenderSegment,
    seg_index: usize,
    input_index: usize,
    plan: &RenderPlan,
) -> Vec<String> {
    match segment.layout {
        Layout::Single => vec![single_filter(segment, seg_index, input_index, plan)],
        Layout::Grid { columns, rows } => {
            grid_filters(segment, seg_index, input_index, plan, columns, rows)
        }
    }
}

/// Full-frame letterboxed chain with animation for a single-photo segment.
fn single_filter(
    segment: &RenderSegment,
    seg_index: usize,
    input_index: usize,
    plan: &RenderPlan,
) -> String {
    let (w, h) = (plan.width, plan.height);
    let mut chain = format!(
        "[{input_index}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1"
    );

    if let Some(zoompan) = zoompan_filter(segment, plan) {
        chain.push(',');
        chain.push_str(&zoompan);
    }

    for fade in fade_filters(segment) {
        chain.push(',');
        chain.push_str(&fade);
    }

    if let Some(color) = segment.curve(CurveTarget::Color) {
        chain.push_str(&format!(",eq=contrast={:.3}", color.start.as_scalar()));
    }

    chain.push_str(&format!("[s{seg_index}]"));
    chain
}

/// zoompan expression for the segment's scale/position curves.
///
/// Runs with d=1 so `on` counts output frames across the whole segment;
/// both curves interpolate linearly over the frame count.
fn zoompan_filter(segment: &RenderSegment, plan: &RenderPlan) -> Option<String> {
    let scale = segment.curve(CurveTarget::Scale);
    let position = segment.curve(CurveTarget::Position);
    if scale.is_none() && position.is_none() {
        return None;
    }

    let frames = ((segment.duration * plan.fps as f64).round() as u64).max(1);

    let z_expr = match scale {
        Some(curve) => {
            let zs = curve.start.as_scalar();
            let ze = curve.end.as_scalar();
            format!("max({zs:.4}+({ze:.4}-{zs:.4})*on/{frames},1)")
        }
        None => "1".to_string(),
    };

    let (x_expr, y_expr) = match position {
        Some(curve) => {
            let s = curve.start.as_point();
            let e = curve.end.as_point();
            (
                format!(
                    "iw/2-(iw/zoom/2)+({:.4}+({:.4}-{:.4})*on/{frames})*iw",
                    s.x, e.x, s.x
                ),
                format!(
                    "ih/2-(ih/zoom/2)+({:.4}+({:.4}-{:.4})*on/{frames})*ih",
                    s.y, e.y, s.y
                ),
            )
        }
        None => (
            "iw/2-(iw/zoom/2)".to_string(),
            "ih/2-(ih/zoom/2)".to_string(),
        ),
    };

    Some(format!(
        "zoompan=z='{z_expr}':x='{x_expr}':y='{y_expr}':d=1:s={}x{}",
        plan.width, plan.height
    ))
}

/// fade filters for the segment's windowed opacity curves.
fn fade_filters(segment: &RenderSegment) -> Vec<String> {
    segment
        .curves_for(CurveTarget::Opacity)
        .filter_map(|curve| {
            let (begin, end) = curve.window?;
            let length = end - begin;
            if length <= 0.0 {
                return None;
            }
            if curve.end.as_scalar() >= curve.start.as_scalar() {
                Some(format!("fade=t=in:st={begin:.3}:d={length:.3}"))
            } else {
                Some(format!("fade=t=out:st={begin:.3}:d={length:.3}"))
            }
        })
        .collect()
}

/// Cell/row/stack chains for a grid segment.
fn grid_filters(
    segment: &RenderSegment,
    seg_index: usize,
    input_index: usize,
    plan: &RenderPlan,
    columns: u32,
    rows: u32,
) -> Vec<String> {
    let (w, h) = (plan.width, plan.height);
    let count = segment.photos.len();

    // A lone photo renders full frame even in a grid scene.
    if count == 1 {
        return vec![single_filter(segment, seg_index, input_index, plan)];
    }

    let columns = columns.max(1);
    let rows = rows.max(1);
    let cell_w = w / columns;
    let cell_h = h / rows;
    let mut filters = Vec::new();

    // Each cell letterboxed independently against black.
    for j in 0..count {
        filters.push(format!(
            "[{}:v]scale={cell_w}:{cell_h}:force_original_aspect_ratio=decrease,\
             pad={cell_w}:{cell_h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1[g{seg_index}c{j}]",
            input_index + j
        ));
    }

    // Rows of up to `columns` cells, padded to full frame width.
    let row_count = count.div_ceil(columns as usize);
    for r in 0..row_count {
        let start = r * columns as usize;
        let cells_in_row = (count - start).min(columns as usize);
        let labels: String = (start..start + cells_in_row)
            .map(|j| format!("[g{seg_index}c{j}]"))
            .collect();

        if cells_in_row == 1 {
            filters.push(format!(
                "{labels}pad={w}:{cell_h}:(ow-iw)/2:0:black[g{seg_index}r{r}]"
            ));
        } else {
            filters.push(format!(
                "{labels}hstack=inputs={cells_in_row},pad={w}:{cell_h}:(ow-iw)/2:0:black[g{seg_index}r{r}]"
            ));
        }
    }

    // Stack rows and pad to full frame height.
    let row_labels: String = (0..row_count)
        .map(|r| format!("[g{seg_index}r{r}]"))
        .collect();
    let mut final_chain = if row_count == 1 {
        format!("{row_labels}pad={w}:{h}:0:(oh-ih)/2:black")
    } else {
        format!("{row_labels}vstack=inputs={row_count},pad={w}:{h}:0:(oh-ih)/2:black")
    };

    for fade in fade_filters(segment) {
        final_chain.push(',');
        final_chain.push_str(&fade);
    }
    final_chain.push_str(&format!("[s{seg_index}]"));
    filters.push(final_chain);

    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{
        AnimationCurve, AudioTrack, CurveValue, Easing, PhotoOrigin, QualityPreset, ResolvedPhoto,
        SceneKind,
    };
    use std::path::PathBuf;
    use std::time::Duration;

    fn photo(i: usize) -> ResolvedPhoto {
        ResolvedPhoto::new(format!("/tmp/p{i}.jpg"), PhotoOrigin::Local, 1)
    }

    fn ctx() -> BackendContext {
        BackendContext::new(QualityPreset::Fast, Duration::from_secs(600))
    }

    fn zoom_segment() -> RenderSegment {
        RenderSegment {
            scene_id: "zoom".into(),
            scene_kind: SceneKind::Zoom,
            photos: vec![photo(0)],
            duration: 4.0,
            layout: Layout::Single,
            curves: vec![
                AnimationCurve {
                    target: CurveTarget::Scale,
                    start: CurveValue::Scalar(1.0),
                    end: CurveValue::Scalar(1.3),
                    easing: Easing::EaseInOut,
                    window: None,
                },
                AnimationCurve {
                    target: CurveTarget::Opacity,
                    start: CurveValue::Scalar(0.0),
                    end: CurveValue::Scalar(1.0),
                    easing: Easing::Linear,
                    window: Some((0.0, 1.0)),
                },
            ],
        }
    }

    fn grid_segment(n: usize) -> RenderSegment {
        RenderSegment {
            scene_id: "grid".into(),
            scene_kind: SceneKind::Grid,
            photos: (0..n).map(photo).collect(),
            duration: 8.0,
            layout: Layout::Grid { columns: 3, rows: 2 },
            curves: vec![],
        }
    }

    fn plan(segments: Vec<RenderSegment>, audio: bool) -> RenderPlan {
        RenderPlan {
            segments,
            width: 1280,
            height: 720,
            fps: 24,
            audio: audio.then(|| AudioTrack {
                path: PathBuf::from("/tmp/bg.mp3"),
                volume: 0.3,
                fade: 2.0,
                loop_to_fit: true,
            }),
        }
    }

    fn args_for(plan: &RenderPlan) -> Vec<String> {
        build_command(plan, Path::new("/tmp/out.mp4"), &ctx())
            .unwrap()
            .build_args()
    }

    #[test]
    fn test_zoom_segment_produces_zoompan() {
        let args = args_for(&plan(vec![zoom_segment()], false));
        let graph = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();

        assert!(graph.contains("zoompan"));
        assert!(graph.contains("fade=t=in"));
        assert!(graph.contains("concat=n=1:v=1:a=0[vout]"));
    }

    #[test]
    fn test_grid_segment_stacks_cells() {
        let args = args_for(&plan(vec![grid_segment(6)], false));
        let graph = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();

        assert!(graph.contains("hstack=inputs=3"));
        assert!(graph.contains("vstack=inputs=2"));
        // 6 cells at 426x360 for a 3x2 grid on 1280x720
        assert!(graph.contains("scale=426:360"));
    }

    #[test]
    fn test_audio_adds_looped_input_and_mix_filter() {
        let plan = plan(vec![zoom_segment(), grid_segment(3)], true);
        let args = args_for(&plan);

        assert!(args.contains(&"-stream_loop".to_string()));
        assert!(args.contains(&"/tmp/bg.mp3".to_string()));
        assert!(args.contains(&"[aout]".to_string()));
        assert!(args.contains(&"aac".to_string()));

        let graph = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();
        // Audio input index = total photo slots (1 + 3).
        assert!(graph.contains("[4:a]volume=0.30"));
        assert!(graph.contains("afade=t=out:st=10.00"));
        assert!(graph.contains("atrim=0:12.000"));
    }

    #[test]
    fn test_silent_plan_has_no_audio_mapping() {
        let args = args_for(&plan(vec![zoom_segment()], false));
        assert!(!args.contains(&"[aout]".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn test_output_duration_capped_to_plan_total() {
        let args = args_for(&plan(vec![zoom_segment(), grid_segment(2)], false));
        // Inputs carry their own -t; the output cap is the last one.
        let t = args.iter().rposition(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "12.000");
    }

    #[test]
    fn test_empty_plan_rejected() {
        let empty = plan(vec![], false);
        assert!(build_command(&empty, Path::new("/tmp/out.mp4"), &ctx()).is_err());
    }

    #[test]
    fn test_single_photo_grid_renders_full_frame() {
        let args = args_for(&plan(vec![grid_segment(1)], false));
        let graph = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();
        assert!(graph.contains("scale=1280:720"));
        assert!(!graph.contains("hstack"));
    }
}
