//! On-demand segmented streaming.
//!
//! Players fetch a manifest, then request segments one by one. Each request
//! queues a [`WaitingSegment`] on the [`RunningStream`] for its source,
//! stream type and resolution; the [`StreamManager`] monitor makes sure a
//! transcode is producing what is waited for, restarts it on seeks, stops it
//! when it runs too far ahead, and evicts idle streams with their cache
//! directories.

mod handlers;
mod manager;
mod process;
mod running;
mod segment_type;
mod source;
mod stream_type;

pub use handlers::stream_router;
pub use manager::{Manifest, SegmentRequest, ServedSegment, StreamManager, StreamStatus};
pub use process::TranscodeProcess;
pub use running::{Reconciled, RunningStream, StreamKey, WaitingSegment};
pub use segment_type::{SegmentIndex, SegmentType};
pub use source::SourceFile;
pub use stream_type::StreamType;

use std::time::Duration;
use streamforge_av::VideoCodec;
use streamforge_common::StreamingResolution;

/// Transcode preferences consulted whenever a stream starts.
pub trait TranscodeSettings: Send + Sync {
    /// Resolution cap applied when a request names none.
    fn max_streaming_transcode_size(&self) -> StreamingResolution;

    fn hardware_acceleration_enabled(&self) -> bool;

    /// Preferred hardware encoder, used only when acceleration is enabled and
    /// the encoder suits the stream type.
    fn hardware_codec(&self) -> Option<VideoCodec>;

    /// Extra arguments placed before the input.
    fn live_input_args(&self) -> Vec<String>;

    /// Extra arguments appended after the output.
    fn live_output_args(&self) -> Vec<String>;
}

/// Timing and distance limits of the stream lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct StreamTuning {
    /// How long a request waits for its segment to appear.
    pub segment_wait: Duration,
    pub monitor_interval: Duration,
    /// Segments a request may lie ahead of a transcode before it restarts.
    pub max_segment_gap: u32,
    /// Segments a transcode may run ahead of the last request before it stops.
    pub max_segment_buffer: u32,
    /// Idle time after which a stream with no pending requests is evicted.
    pub max_idle: Duration,
    /// Grace period between interrupting and killing a transcode.
    pub cancel_timeout: Duration,
}

impl Default for StreamTuning {
    fn default() -> Self {
        Self {
            segment_wait: Duration::from_secs(15),
            monitor_interval: Duration::from_millis(200),
            max_segment_gap: 5,
            max_segment_buffer: 15,
            max_idle: Duration::from_secs(30),
            cancel_timeout: Duration::from_secs(3),
        }
    }
}
