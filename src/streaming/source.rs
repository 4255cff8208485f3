//! Source file descriptors.

use serde::Serialize;
use std::path::PathBuf;
use streamforge_av::{is_supported_audio_codec, MediaInfo};
use streamforge_media::dash::frame_rate_ratio;
use streamforge_media::Timeline;

/// Everything the streaming engine needs to know about a source file.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// Fingerprint identifying the source in URLs and cache directories.
    pub hash: String,
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    /// Probed rational frame rate, e.g. "24000/1001".
    pub avg_frame_rate: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl SourceFile {
    /// Build a descriptor from probe output.
    pub fn from_media_info(hash: impl Into<String>, info: &MediaInfo) -> Self {
        let video = info.primary_video();
        Self {
            hash: hash.into(),
            path: info.file_path.clone(),
            duration: info.duration_secs(),
            width: video.map(|v| v.width).unwrap_or(0),
            height: video.map(|v| v.height).unwrap_or(0),
            frame_rate: video.and_then(|v| v.frame_rate),
            avg_frame_rate: video.and_then(|v| v.avg_frame_rate.clone()),
            video_codec: video.map(|v| v.codec.clone()),
            audio_codec: info.primary_audio().map(|a| a.codec.clone()),
        }
    }

    pub fn timeline(&self) -> Timeline {
        Timeline::new(self.duration)
    }

    /// Whether the source carries audio that can be transcoded.
    pub fn has_audio(&self) -> bool {
        self.audio_codec
            .as_deref()
            .is_some_and(is_supported_audio_codec)
    }

    /// Frame rate as a DASH rational.
    pub fn dash_frame_rate(&self) -> String {
        match (&self.avg_frame_rate, self.frame_rate) {
            (Some(rate), _) => rate.clone(),
            (None, Some(fps)) => frame_rate_ratio(fps),
            (None, None) => frame_rate_ratio(0.0),
        }
    }

    /// Output dimensions once the smaller side is capped at `max`.
    pub fn scaled_dimensions(&self, max: u32) -> (u32, u32) {
        let smaller = self.width.min(self.height);
        if max == 0 || smaller == 0 || max >= smaller {
            return (self.width, self.height);
        }
        let factor = max as f64 / smaller as f64;
        (
            (self.width as f64 * factor) as u32,
            (self.height as f64 * factor) as u32,
        )
    }
}
