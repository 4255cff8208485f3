use crate::streaming::{StreamTuning, TranscodeSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use streamforge_av::VideoCodec;
use streamforge_common::StreamingResolution;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Directories scanned for source files
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Where stream directories are created
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("streamforge-cache")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Resolution cap used when a request names none
    #[serde(default)]
    pub max_streaming_transcode_size: StreamingResolution,

    #[serde(default)]
    pub hardware_acceleration: bool,

    /// Hardware encoder name, e.g. "h264_vaapi"
    #[serde(default)]
    pub hardware_codec: Option<String>,

    /// Extra ffmpeg arguments placed before the input
    #[serde(default)]
    pub live_input_args: Vec<String>,

    /// Extra ffmpeg arguments appended after the output
    #[serde(default)]
    pub live_output_args: Vec<String>,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl TranscodeSettings for TranscodeConfig {
    fn max_streaming_transcode_size(&self) -> StreamingResolution {
        self.max_streaming_transcode_size
    }

    fn hardware_acceleration_enabled(&self) -> bool {
        self.hardware_acceleration
    }

    fn hardware_codec(&self) -> Option<VideoCodec> {
        self.hardware_codec.as_deref().and_then(|c| c.parse().ok())
    }

    fn live_input_args(&self) -> Vec<String> {
        self.live_input_args.clone()
    }

    fn live_output_args(&self) -> Vec<String> {
        self.live_output_args.clone()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// How long a segment request waits before failing
    #[serde(default = "default_segment_wait")]
    pub segment_wait_secs: u64,

    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_ms: u64,

    /// Segments a request may lie ahead of the transcode before it restarts
    #[serde(default = "default_max_segment_gap")]
    pub max_segment_gap: u32,

    /// Segments the transcode may run ahead of the player before it stops
    #[serde(default = "default_max_segment_buffer")]
    pub max_segment_buffer: u32,

    #[serde(default = "default_max_idle")]
    pub max_idle_secs: u64,

    /// Grace period between interrupting and killing ffmpeg
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout_secs: u64,
}

fn default_segment_wait() -> u64 {
    15
}
fn default_monitor_interval() -> u64 {
    200
}
fn default_max_segment_gap() -> u32 {
    5
}
fn default_max_segment_buffer() -> u32 {
    15
}
fn default_max_idle() -> u64 {
    30
}
fn default_cancel_timeout() -> u64 {
    3
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            segment_wait_secs: default_segment_wait(),
            monitor_interval_ms: default_monitor_interval(),
            max_segment_gap: default_max_segment_gap(),
            max_segment_buffer: default_max_segment_buffer(),
            max_idle_secs: default_max_idle(),
            cancel_timeout_secs: default_cancel_timeout(),
        }
    }
}

impl StreamingConfig {
    pub fn tuning(&self) -> StreamTuning {
        StreamTuning {
            segment_wait: Duration::from_secs(self.segment_wait_secs),
            monitor_interval: Duration::from_millis(self.monitor_interval_ms),
            max_segment_gap: self.max_segment_gap,
            max_segment_buffer: self.max_segment_buffer,
            max_idle: Duration::from_secs(self.max_idle_secs),
            cancel_timeout: Duration::from_secs(self.cancel_timeout_secs),
        }
    }
}
