//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Encode failed: {message}")]
    EncodeFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Encoder reported success but no output file materialized: {0}")]
    OutputMissing(PathBuf),

    #[error("FFprobe command failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Image processing failed for {path}: {message}")]
    ImageFailed { path: PathBuf, message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid frame dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an encode failure error.
    pub fn encode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::EncodeFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an image processing error.
    pub fn image_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ImageFailed {
            path: path.into(),
            message: message.into(),
        }
    }
}
