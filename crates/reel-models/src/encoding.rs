//! Encoding options and the canonical quality preset table.
//!
//! One table maps a caller-chosen preset to photo-optimization bounds and
//! encoder settings. Both rendering backends and the photo optimizer read
//! from it; nothing duplicates these numbers.

use serde::{Deserialize, Serialize};

/// Default output container format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp4";
/// Default video codec (H.264).
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate.
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Attenuation applied to background audio.
pub const BACKGROUND_AUDIO_VOLUME: f64 = 0.3;
/// Maximum background audio fade length in seconds.
pub const BACKGROUND_AUDIO_FADE_SECS: f64 = 2.0;

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Hd720,
    #[default]
    Hd1080,
    Uhd4k,
}

impl Resolution {
    /// Frame dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Hd720 => (1280, 720),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Uhd4k => (3840, 2160),
        }
    }

    /// Parse the caller-facing label ("720p", "1080p", "4k").
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "720p" => Some(Resolution::Hd720),
            "1080p" => Some(Resolution::Hd1080),
            "4k" => Some(Resolution::Uhd4k),
            _ => None,
        }
    }
}

/// Quality preset: one canonical source of truth for optimization bounds
/// and encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    #[default]
    Fast,
    Balanced,
    HighQuality,
}

impl QualityPreset {
    /// Maximum photo dimensions (width, height) after optimization.
    pub fn max_photo_size(&self) -> (u32, u32) {
        match self {
            QualityPreset::Fast => (1280, 720),
            QualityPreset::Balanced => (1920, 1080),
            QualityPreset::HighQuality => (3840, 2160),
        }
    }

    /// JPEG re-encode quality (1-100).
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            QualityPreset::Fast => 85,
            QualityPreset::Balanced => 90,
            QualityPreset::HighQuality => 95,
        }
    }

    /// x264 preset name.
    pub fn ffmpeg_preset(&self) -> &'static str {
        match self {
            QualityPreset::Fast => "fast",
            QualityPreset::Balanced => "medium",
            QualityPreset::HighQuality => "slow",
        }
    }

    /// Constant rate factor (lower is better).
    pub fn crf(&self) -> u8 {
        match self {
            QualityPreset::Fast => 23,
            QualityPreset::Balanced => 20,
            QualityPreset::HighQuality => 18,
        }
    }

    /// Output frame rate.
    pub fn fps(&self) -> u32 {
        match self {
            QualityPreset::Fast => 24,
            QualityPreset::Balanced | QualityPreset::HighQuality => 30,
        }
    }

    /// Preset chosen from frame width when the caller supplied none.
    pub fn for_width(width: u32) -> Self {
        if width <= 1280 {
            QualityPreset::Fast
        } else if width <= 1920 {
            QualityPreset::Balanced
        } else {
            QualityPreset::HighQuality
        }
    }

    /// Encoder output arguments shared by both backends.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-preset".to_string(),
            self.ffmpeg_preset().to_string(),
            "-crf".to_string(),
            self.crf().to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-tune".to_string(),
            "film".to_string(),
        ]
    }
}

/// Which rendering backend executes the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// External-encoder command derived from the plan.
    FilterGraph,
    /// In-process clip graph flattened through a raw-frame encoder sink.
    #[default]
    ClipCompositor,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::FilterGraph => "filter_graph",
            BackendKind::ClipCompositor => "clip_compositor",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-supplied encoding options for one composition job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingOptions {
    #[serde(default)]
    pub resolution: Resolution,
    /// Explicit frame rate; falls back to the preset's rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Output container format extension.
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub quality: QualityPreset,
    /// Attach the template's background audio track.
    #[serde(default = "default_true")]
    pub background_audio: bool,
    #[serde(default)]
    pub backend: BackendKind,
}

fn default_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: None,
            format: default_format(),
            quality: QualityPreset::default(),
            background_audio: true,
            backend: BackendKind::default(),
        }
    }
}

impl EncodingOptions {
    /// Effective frame rate for this job.
    pub fn effective_fps(&self) -> u32 {
        self.fps.unwrap_or_else(|| self.quality.fps())
    }

    /// Frame dimensions for this job.
    pub fn dimensions(&self) -> (u32, u32) {
        self.resolution.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_table() {
        assert_eq!(QualityPreset::Fast.max_photo_size(), (1280, 720));
        assert_eq!(QualityPreset::Fast.crf(), 23);
        assert_eq!(QualityPreset::Balanced.ffmpeg_preset(), "medium");
        assert_eq!(QualityPreset::HighQuality.jpeg_quality(), 95);
    }

    #[test]
    fn test_preset_for_width() {
        assert_eq!(QualityPreset::for_width(1280), QualityPreset::Fast);
        assert_eq!(QualityPreset::for_width(1920), QualityPreset::Balanced);
        assert_eq!(QualityPreset::for_width(3840), QualityPreset::HighQuality);
    }

    #[test]
    fn test_ffmpeg_args_contain_preset_and_crf() {
        let args = QualityPreset::Balanced.to_ffmpeg_args();
        assert!(args.contains(&"-preset".to_string()));
        assert!(args.contains(&"medium".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"20".to_string()));
    }

    #[test]
    fn test_effective_fps_prefers_explicit() {
        let options = EncodingOptions {
            fps: Some(60),
            ..Default::default()
        };
        assert_eq!(options.effective_fps(), 60);

        let defaulted = EncodingOptions::default();
        assert_eq!(defaulted.effective_fps(), defaulted.quality.fps());
    }

    #[test]
    fn test_resolution_labels() {
        assert_eq!(Resolution::from_label("720p"), Some(Resolution::Hd720));
        assert_eq!(Resolution::from_label("1080p"), Some(Resolution::Hd1080));
        assert_eq!(Resolution::from_label("4k"), Some(Resolution::Uhd4k));
        assert_eq!(Resolution::from_label("8k"), None);
    }
}
