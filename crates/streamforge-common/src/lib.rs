//! Streamforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across streamforge:
//!
//! - **Error Handling**: the streaming error taxonomy and result alias
//! - **Resolution Buckets**: [`StreamingResolution`] caps for transcoded output
//! - **Path Utilities**: Functions to detect video files by extension
//!
//! # Examples
//!
//! ```
//! use streamforge_common::{Error, Result, StreamingResolution};
//! use streamforge_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let resolution: StreamingResolution = "FULL_HD".parse().unwrap();
//! assert_eq!(resolution.max_resolution(), 1080);
//!
//! assert!(is_video_file(Path::new("movie.mkv")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::invalid_segment("abc"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod paths;
pub mod resolution;

pub use error::{Error, Result};
pub use resolution::StreamingResolution;
