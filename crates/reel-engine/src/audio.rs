//! Background audio resolution.
//!
//! Silence is never a fatal condition: a missing named track falls back
//! to the default track, and a missing default simply produces a silent
//! video.

use std::path::Path;

use tracing::{info, warn};

use reel_models::catalog::DEFAULT_BACKGROUND_TRACK;
use reel_models::encoding::{BACKGROUND_AUDIO_FADE_SECS, BACKGROUND_AUDIO_VOLUME};
use reel_models::{AudioTrack, Template};

/// Resolve the background audio track for a job.
///
/// Returns `None` when audio is disabled or no track file is available.
pub fn resolve_audio(
    template: &Template,
    assets_dir: &Path,
    background_audio: bool,
    total_duration: f64,
) -> Option<AudioTrack> {
    if !background_audio {
        info!("Background audio disabled for this job");
        return None;
    }

    let named = template
        .background_audio
        .as_deref()
        .unwrap_or(DEFAULT_BACKGROUND_TRACK);

    let mut path = assets_dir.join(named);
    if !path.is_file() {
        warn!(
            track = named,
            "Template audio track missing, falling back to default"
        );
        path = assets_dir.join(DEFAULT_BACKGROUND_TRACK);
        if !path.is_file() {
            info!("No background audio available, proceeding silently");
            return None;
        }
    }

    Some(AudioTrack {
        path,
        volume: BACKGROUND_AUDIO_VOLUME,
        fade: BACKGROUND_AUDIO_FADE_SECS.min(total_duration / 4.0),
        loop_to_fit: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn template(track: Option<&str>) -> Template {
        Template {
            id: "t".into(),
            name: "T".into(),
            description: String::new(),
            scenes: vec![],
            max_photos: 6,
            background_audio: track.map(String::from),
        }
    }

    #[test]
    fn test_named_track_used_when_present() {
        let assets = TempDir::new().unwrap();
        std::fs::write(assets.path().join("epic.mp3"), b"mp3").unwrap();

        let track = resolve_audio(&template(Some("epic.mp3")), assets.path(), true, 40.0).unwrap();
        assert_eq!(track.path, assets.path().join("epic.mp3"));
        assert!((track.volume - BACKGROUND_AUDIO_VOLUME).abs() < f64::EPSILON);
        assert!((track.fade - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_named_track_falls_back_to_default() {
        let assets = TempDir::new().unwrap();
        std::fs::write(assets.path().join(DEFAULT_BACKGROUND_TRACK), b"mp3").unwrap();

        let track = resolve_audio(&template(Some("gone.mp3")), assets.path(), true, 40.0).unwrap();
        assert_eq!(track.path, assets.path().join(DEFAULT_BACKGROUND_TRACK));
    }

    #[test]
    fn test_no_track_available_is_silent_not_fatal() {
        let assets = TempDir::new().unwrap();
        assert!(resolve_audio(&template(Some("gone.mp3")), assets.path(), true, 40.0).is_none());
    }

    #[test]
    fn test_audio_disabled() {
        let assets = TempDir::new().unwrap();
        std::fs::write(assets.path().join(DEFAULT_BACKGROUND_TRACK), b"mp3").unwrap();

        assert!(resolve_audio(&template(None), assets.path(), false, 40.0).is_none());
    }

    #[test]
    fn test_fade_caps_to_quarter_of_short_video() {
        let assets = TempDir::new().unwrap();
        std::fs::write(assets.path().join(DEFAULT_BACKGROUND_TRACK), b"mp3").unwrap();

        let track = resolve_audio(&template(None), assets.path(), true, 4.0).unwrap();
        assert!((track.fade - 1.0).abs() < f64::EPSILON);
    }
}
