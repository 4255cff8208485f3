//! DASH manifest generation.

mod mpd;

pub use mpd::{frame_rate_ratio, AdaptationSet, Mpd, Representation, SegmentTemplate};

/// MIME type of a DASH manifest.
pub const MIME_DASH: &str = "application/dash+xml";
