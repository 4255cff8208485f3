//! Streamforge - on-demand HLS/DASH streaming with just-in-time transcoding
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod library;
pub mod lock;
pub mod server;
pub mod streaming;
