//! Streamforge-Media: segment timelines and manifest generation
//!
//! Live transcodes cut the source into fixed-length segments. This crate owns
//! the arithmetic of that timeline and renders the manifests players fetch
//! before requesting any segment.
//!
//! # Modules
//!
//! - `timeline` - Fixed-length segment math (count, last index, durations)
//! - `hls` - HLS media playlist generation (m3u8)
//! - `dash` - DASH manifest generation (MPD)
//!
//! # Example
//!
//! ```
//! use streamforge_media::{MediaPlaylist, Timeline};
//!
//! let timeline = Timeline::new(5.0);
//! assert_eq!(timeline.segment_count(), 3);
//!
//! let playlist = MediaPlaylist::from_timeline(&timeline, "/api/stream/abc/hls", "ts", None);
//! assert!(playlist.render().contains("#EXTINF:1.000000,"));
//! ```

pub mod dash;
pub mod error;
pub mod hls;
pub mod timeline;

pub use dash::{AdaptationSet, Mpd, Representation, SegmentTemplate};
pub use error::{Error, Result};
pub use hls::MediaPlaylist;
pub use timeline::{Timeline, SEGMENT_LENGTH};
