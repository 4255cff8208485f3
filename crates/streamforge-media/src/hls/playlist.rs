//! HLS playlist structures.

use crate::timeline::{Timeline, SEGMENT_LENGTH};
use std::fmt::{self, Write};

/// Media playlist for a single rendition.
#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    /// Protocol version.
    pub version: u32,
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number.
    pub media_sequence: u32,
    /// Segment entries.
    pub segments: Vec<SegmentEntry>,
}

impl MediaPlaylist {
    /// Create a new VOD playlist.
    pub fn vod() -> Self {
        Self {
            version: 3,
            target_duration: SEGMENT_LENGTH,
            media_sequence: 0,
            segments: Vec::new(),
        }
    }

    /// Create from a segment timeline.
    ///
    /// Segment URIs are `{base_url}/{index}.{extension}`, followed by
    /// `?{query}` when a query is given.
    pub fn from_timeline(
        timeline: &Timeline,
        base_url: &str,
        extension: &str,
        query: Option<&str>,
    ) -> Self {
        let mut playlist = Self::vod();
        let suffix = query.map(|q| format!("?{}", q)).unwrap_or_default();

        for (i, duration) in timeline.segments() {
            playlist.segments.push(SegmentEntry {
                duration,
                uri: format!("{}/{}.{}{}", base_url, i, extension, suffix),
            });
        }

        playlist
    }

    /// Write the M3U8 text to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "#EXTM3U")?;
        writeln!(out, "#EXT-X-VERSION:{}", self.version)?;
        writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence)?;
        writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration)?;
        writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD")?;

        for segment in &self.segments {
            writeln!(out, "#EXTINF:{:.6},", segment.duration)?;
            writeln!(out, "{}", segment.uri)?;
        }

        writeln!(out, "#EXT-X-ENDLIST")
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }
}

/// A segment entry in the playlist.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    /// Duration in seconds.
    pub duration: f64,
    /// Segment URI.
    pub uri: String,
}
