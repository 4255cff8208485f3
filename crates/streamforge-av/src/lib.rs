//! # streamforge-av
//!
//! Media probing and ffmpeg command construction for live transcoding.
//!
//! This crate provides functionality for:
//! - Probing media files with ffprobe to extract duration, dimensions and codecs
//! - Detecting the external tools the streaming engine depends on
//! - Building ffmpeg argument lists, codec init flags and video filters
//! - Creating spawnable ffmpeg commands with piped output
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use streamforge_av::{FfprobeProber, Prober};
//! use std::path::Path;
//!
//! # async fn run() -> streamforge_av::Result<()> {
//! let prober = FfprobeProber::default();
//! let info = prober.probe(Path::new("/path/to/video.mkv")).await?;
//! println!("Duration: {:?}", info.duration);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod codec;
pub mod encoder;
mod error;
pub mod filter;
pub mod probe;
pub mod tools;

// Re-exports
pub use args::{Args, LogLevel};
pub use codec::{is_supported_audio_codec, VideoCodec};
pub use encoder::FFMpeg;
pub use error::{Error, Result};
pub use filter::VideoFilter;
pub use probe::{AudioTrack, FfprobeProber, MediaInfo, Prober, VideoTrack};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
