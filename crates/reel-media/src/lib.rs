//! FFmpeg CLI wrapper and image tooling for the Photoreel engine.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with any number of inputs
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio watch channels
//! - A raw RGBA frame sink for in-process compositing backends
//! - Best-effort photo optimization (orientation, flatten, downscale)
//! - FFprobe probing for output validation

pub mod command;
pub mod error;
pub mod framesink;
pub mod fs_utils;
pub mod optimize;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use framesink::{RawFrameSink, RawFrameSinkOpts, SinkAudio};
pub use fs_utils::move_file;
pub use optimize::{optimize_photo, optimize_photos, target_size};
pub use probe::{get_duration, probe_media, MediaInfo};
pub use progress::{parse_progress_line, FfmpegProgress, ProgressCallback};
