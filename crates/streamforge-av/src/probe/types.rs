//! Media information types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Information about a media file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the media file.
    pub file_path: PathBuf,
    /// File size in bytes.
    pub file_size: u64,
    /// Container format (e.g., "matroska,webm", "mov,mp4,m4a").
    pub container: String,
    /// Duration of the media.
    pub duration: Option<Duration>,
    /// Video tracks in the file.
    pub video_tracks: Vec<VideoTrack>,
    /// Audio tracks in the file.
    pub audio_tracks: Vec<AudioTrack>,
}

/// Information about a video track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTrack {
    /// Track index.
    pub index: u32,
    /// Video codec (e.g., "h264", "hevc").
    pub codec: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate in FPS.
    pub frame_rate: Option<f64>,
    /// Average frame rate as reported, e.g. "24000/1001".
    pub avg_frame_rate: Option<String>,
}

/// Information about an audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Track index.
    pub index: u32,
    /// Audio codec (e.g., "aac", "opus").
    pub codec: String,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Language code (e.g., "eng", "spa").
    pub language: Option<String>,
}

impl MediaInfo {
    /// Get the primary (first) video track.
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }

    /// Get the primary (first) audio track.
    pub fn primary_audio(&self) -> Option<&AudioTrack> {
        self.audio_tracks.first()
    }

    /// Duration in seconds, 0 when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_secs() {
        let mut info = MediaInfo::default();
        assert_eq!(info.duration_secs(), 0.0);
        info.duration = Some(Duration::from_millis(81_500));
        assert!((info.duration_secs() - 81.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_primary_tracks() {
        let info = MediaInfo {
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: "h264".into(),
                width: 1920,
                height: 1080,
                frame_rate: Some(23.976),
                avg_frame_rate: Some("24000/1001".into()),
            }],
            ..Default::default()
        };
        assert_eq!(info.primary_video().map(|v| v.width), Some(1920));
        assert!(info.primary_audio().is_none());
    }
}
