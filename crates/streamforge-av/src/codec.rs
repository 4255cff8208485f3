//! Video encoder table.
//!
//! Each codec knows its ffmpeg encoder name, its rate-control flags, and for
//! hardware encoders the device setup and upload filter it needs. Hardware
//! encoders here always decode in software and upload frames before scaling.

use crate::args::Args;
use std::fmt;
use std::str::FromStr;

/// A target video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    LibX264,
    Vp9,
    Copy,
    H264Nvenc,
    H264Qsv,
    H264Vaapi,
    H264VideoToolbox,
    H264V4l2m2m,
    Vp9Qsv,
    Vp9Vaapi,
}

impl VideoCodec {
    /// Hardware encoders in preference order.
    pub const HARDWARE: [VideoCodec; 7] = [
        Self::H264Nvenc,
        Self::H264Qsv,
        Self::H264Vaapi,
        Self::H264V4l2m2m,
        Self::Vp9Qsv,
        Self::Vp9Vaapi,
        Self::H264VideoToolbox,
    ];

    /// ffmpeg encoder name.
    pub fn name(self) -> &'static str {
        match self {
            Self::LibX264 => "libx264",
            Self::Vp9 => "libvpx-vp9",
            Self::Copy => "copy",
            Self::H264Nvenc => "h264_nvenc",
            Self::H264Qsv => "h264_qsv",
            Self::H264Vaapi => "h264_vaapi",
            Self::H264VideoToolbox => "h264_videotoolbox",
            Self::H264V4l2m2m => "h264_v4l2m2m",
            Self::Vp9Qsv => "vp9_qsv",
            Self::Vp9Vaapi => "vp9_vaapi",
        }
    }

    pub fn is_hardware(self) -> bool {
        Self::HARDWARE.contains(&self)
    }

    /// Whether the encoder produces H.264 that can be muxed into MPEG-TS.
    pub fn hls_compatible(self) -> bool {
        matches!(
            self,
            Self::H264Nvenc
                | Self::H264Qsv
                | Self::H264Vaapi
                | Self::H264VideoToolbox
                | Self::H264V4l2m2m
        )
    }

    /// Whether the encoder produces VP9 for WebM chunks.
    pub fn webm_compatible(self) -> bool {
        matches!(self, Self::Vp9Qsv | Self::Vp9Vaapi)
    }

    /// `-c:v {name}` followed by the encoder's rate-control flags.
    pub fn init_args(self) -> Args {
        let mut args = Args::new();
        args.args(["-c:v", self.name()]);
        match self {
            Self::LibX264 => {
                args.args([
                    "-pix_fmt",
                    "yuv420p",
                    "-preset",
                    "veryfast",
                    "-crf",
                    "25",
                    "-sc_threshold",
                    "0",
                ]);
            }
            Self::Vp9 => {
                args.args([
                    "-pix_fmt",
                    "yuv420p",
                    "-deadline",
                    "realtime",
                    "-cpu-used",
                    "5",
                    "-row-mt",
                    "1",
                    "-crf",
                    "30",
                    "-b:v",
                    "0",
                ]);
            }
            Self::H264Nvenc => {
                args.args(["-rc", "vbr", "-cq", "15"]);
            }
            Self::H264Qsv | Self::Vp9Qsv => {
                args.args(["-global_quality", "20", "-preset", "faster"]);
            }
            Self::H264Vaapi | Self::Vp9Vaapi => {
                args.args(["-qp", "20"]);
            }
            Self::H264VideoToolbox => {
                args.args(["-realtime", "1"]);
            }
            Self::Copy | Self::H264V4l2m2m => {}
        }
        args
    }

    /// Device setup flags placed before the input.
    pub fn device_init_args(self) -> &'static [&'static str] {
        match self {
            Self::H264Nvenc => &["-hwaccel_device", "0"],
            Self::H264Vaapi | Self::Vp9Vaapi => &["-vaapi_device", "/dev/dri/renderD128"],
            Self::H264Qsv | Self::Vp9Qsv => &["-init_hw_device", "qsv=hw", "-filter_hw_device", "hw"],
            Self::H264VideoToolbox => &["-init_hw_device", "videotoolbox=vt"],
            _ => &[],
        }
    }

    /// Filters that move software frames onto the device.
    pub fn upload_filters(self) -> &'static [&'static str] {
        match self {
            Self::H264Vaapi | Self::Vp9Vaapi | Self::H264VideoToolbox | Self::H264V4l2m2m => {
                &["format=nv12", "hwupload"]
            }
            Self::H264Nvenc => &["format=nv12", "hwupload_cuda"],
            Self::H264Qsv | Self::Vp9Qsv => &["hwupload=extra_hw_frames=64", "format=qsv"],
            _ => &[],
        }
    }

    /// Scaler to use once frames live on the device.
    pub fn scale_filter(self) -> &'static str {
        match self {
            Self::H264Nvenc => "scale_cuda",
            Self::H264Vaapi | Self::Vp9Vaapi => "scale_vaapi",
            Self::H264Qsv | Self::Vp9Qsv => "scale_qsv",
            Self::H264VideoToolbox => "scale_vt",
            _ => "scale",
        }
    }

    /// Whether the scaler rejects `-2` and needs both dimensions spelled out.
    pub fn needs_explicit_dimensions(self) -> bool {
        matches!(
            self,
            Self::H264Qsv | Self::Vp9Qsv | Self::H264VideoToolbox
        )
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            Self::LibX264,
            Self::Vp9,
            Self::Copy,
            Self::H264Nvenc,
            Self::H264Qsv,
            Self::H264Vaapi,
            Self::H264VideoToolbox,
            Self::H264V4l2m2m,
            Self::Vp9Qsv,
            Self::Vp9Vaapi,
        ];
        all.into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown video codec: {}", s))
    }
}

const SUPPORTED_AUDIO: &[&str] = &[
    "aac", "mp3", "mp2", "opus", "vorbis", "flac", "ac3", "eac3", "dts", "truehd", "alac",
];

/// Whether an audio stream with this codec can be carried into the output.
///
/// Sources without a recognised audio codec are transcoded video-only.
pub fn is_supported_audio_codec(codec: &str) -> bool {
    let codec = codec.trim().to_ascii_lowercase();
    !codec.is_empty() && (SUPPORTED_AUDIO.contains(&codec.as_str()) || codec.starts_with("pcm_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x264_init() {
        let args = VideoCodec::LibX264.init_args();
        assert_eq!(
            args.to_string(),
            "-c:v libx264 -pix_fmt yuv420p -preset veryfast -crf 25 -sc_threshold 0"
        );
    }

    #[test]
    fn test_copy_init() {
        assert_eq!(VideoCodec::Copy.init_args().to_string(), "-c:v copy");
    }

    #[test]
    fn test_compatibility() {
        assert!(VideoCodec::H264Nvenc.hls_compatible());
        assert!(!VideoCodec::H264Nvenc.webm_compatible());
        assert!(VideoCodec::Vp9Vaapi.webm_compatible());
        assert!(!VideoCodec::LibX264.is_hardware());
        assert!(VideoCodec::Vp9Qsv.is_hardware());
    }

    #[test]
    fn test_parse() {
        assert_eq!("h264_vaapi".parse::<VideoCodec>(), Ok(VideoCodec::H264Vaapi));
        assert_eq!("LIBX264".parse::<VideoCodec>(), Ok(VideoCodec::LibX264));
        assert!("hevc_nvenc".parse::<VideoCodec>().is_err());
    }

    #[test]
    fn test_audio_support() {
        assert!(is_supported_audio_codec("aac"));
        assert!(is_supported_audio_codec("pcm_s16le"));
        assert!(!is_supported_audio_codec(""));
        assert!(!is_supported_audio_codec("cook"));
    }
}
