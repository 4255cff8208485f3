//! HLS playlist generation.
//!
//! This module generates M3U8 media playlists for live-transcoded HLS.

mod playlist;

pub use playlist::{MediaPlaylist, SegmentEntry};

/// MIME type of an HLS playlist.
pub const MIME_HLS: &str = "application/vnd.apple.mpegurl";
