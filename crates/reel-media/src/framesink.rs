//! Raw-frame encoder sink.
//!
//! Spawns ffmpeg reading `rawvideo` RGBA frames from stdin and encoding
//! them to the output container. The clip-compositing backend rasterizes
//! each frame in-process and streams it here; audio is attached as a
//! second input with loop/volume/fade filtering.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

use reel_models::QualityPreset;

use crate::error::{MediaError, MediaResult};

/// Audio attachment for the sink.
#[derive(Debug, Clone)]
pub struct SinkAudio {
    /// Local audio file path.
    pub path: PathBuf,
    /// Attenuation factor.
    pub volume: f64,
    /// Fade-in/out length in seconds.
    pub fade: f64,
    /// Loop the source when shorter than the video.
    pub loop_to_fit: bool,
}

/// Options for the raw-frame sink.
#[derive(Debug, Clone)]
pub struct RawFrameSinkOpts {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Total output duration in seconds; bounds the encode and the audio.
    pub total_duration: f64,
    pub preset: QualityPreset,
    pub audio: Option<SinkAudio>,
}

/// Streams raw RGBA frames into an ffmpeg encode process.
pub struct RawFrameSink {
    opts: RawFrameSinkOpts,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<tokio::task::JoinHandle<String>>,
    frames_written: u64,
}

impl RawFrameSink {
    /// Create a sink; call [`begin`](Self::begin) before pushing frames.
    pub fn new(opts: RawFrameSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_task: None,
            frames_written: 0,
        }
    }

    /// Spawn the encoder process.
    pub async fn begin(&mut self) -> MediaResult<()> {
        if self.opts.width == 0 || self.opts.height == 0 {
            return Err(MediaError::InvalidDimensions(
                "width/height must be non-zero".to_string(),
            ));
        }
        if self.opts.width % 2 != 0 || self.opts.height % 2 != 0 {
            return Err(MediaError::InvalidDimensions(
                "width/height must be even for yuv420p output".to_string(),
            ));
        }
        if self.opts.fps == 0 {
            return Err(MediaError::InvalidDimensions("fps must be non-zero".to_string()));
        }

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        if let Some(parent) = self.opts.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args(["-y", "-v", "error"]);
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgba", "-s"])
            .arg(format!("{}x{}", self.opts.width, self.opts.height))
            .arg("-r")
            .arg(self.opts.fps.to_string())
            .args(["-i", "pipe:0"]);

        if let Some(audio) = &self.opts.audio {
            if audio.loop_to_fit {
                cmd.args(["-stream_loop", "-1"]);
            }
            cmd.arg("-i").arg(&audio.path);

            let fade = audio.fade.max(0.0);
            let fade_out_start = (self.opts.total_duration - fade).max(0.0);
            cmd.arg("-filter_complex").arg(format!(
                "[1:a]volume={:.2},afade=t=in:st=0:d={:.2},afade=t=out:st={:.2}:d={:.2}[aud]",
                audio.volume, fade, fade_out_start, fade
            ));
            cmd.args(["-map", "0:v", "-map", "[aud]", "-c:a", "aac", "-b:a", "128k"]);
        }

        cmd.args(["-c:v", "libx264"]);
        cmd.args(self.opts.preset.to_ffmpeg_args());
        cmd.arg("-t")
            .arg(format!("{:.3}", self.opts.total_duration));
        cmd.arg(&self.opts.output);

        debug!("Spawning raw-frame encoder for {}", self.opts.output.display());

        let mut child = cmd
            .spawn()
            .map_err(|e| MediaError::encode_failed(format!("failed to spawn ffmpeg: {e}"), None, None))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::encode_failed("ffmpeg stdin not captured", None, None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::encode_failed("ffmpeg stderr not captured", None, None))?;

        self.stderr_task = Some(tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = String::new();
            let mut stderr = stderr;
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        }));

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.frames_written = 0;
        Ok(())
    }

    /// Write one RGBA frame (width * height * 4 bytes).
    pub async fn push_frame(&mut self, frame: &[u8]) -> MediaResult<()> {
        let expected = (self.opts.width as usize) * (self.opts.height as usize) * 4;
        if frame.len() != expected {
            return Err(MediaError::InvalidDimensions(format!(
                "frame buffer is {} bytes, expected {}",
                frame.len(),
                expected
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::encode_failed("sink not started", None, None))?;

        stdin.write_all(frame).await.map_err(|e| {
            MediaError::encode_failed(format!("failed to write frame to ffmpeg stdin: {e}"), None, None)
        })?;

        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames pushed so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close stdin and wait for the encoder to finish.
    pub async fn finish(mut self) -> MediaResult<()> {
        drop(self.stdin.take());

        let mut child = self
            .child
            .take()
            .ok_or_else(|| MediaError::encode_failed("sink not started", None, None))?;

        let status = child.wait().await?;

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(MediaError::encode_failed(
                "raw-frame encode exited with non-zero status",
                Some(stderr),
                status.code(),
            ));
        }

        if !self.opts.output.exists() {
            return Err(MediaError::OutputMissing(self.opts.output.clone()));
        }

        Ok(())
    }
}
