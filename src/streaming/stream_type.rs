//! Delivery variants: how each one is transcoded and described to players.

use super::segment_type::SegmentType;
use super::source::SourceFile;
use super::TranscodeSettings;
use serde::{Serialize, Serializer};
use std::fmt::{self, Write};
use std::path::Path;
use std::str::FromStr;
use streamforge_av::{Args, LogLevel, VideoCodec, VideoFilter};
use streamforge_media::dash::{AdaptationSet, Mpd, MIME_DASH};
use streamforge_media::hls::MIME_HLS;
use streamforge_media::{MediaPlaylist, SEGMENT_LENGTH};

const KEY_FRAME_EXPR: &str = "expr:gte(t,n_forced*2)";

/// One delivery variant of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// HLS with a re-encoded H.264 video track.
    Hls,
    /// HLS with the source video stream copied.
    HlsCopy,
    /// DASH VP9 video chunks.
    DashVideo,
    /// DASH Opus audio chunks.
    DashAudio,
}

impl StreamType {
    pub const ALL: [StreamType; 4] = [Self::Hls, Self::HlsCopy, Self::DashVideo, Self::DashAudio];

    pub fn name(self) -> &'static str {
        match self {
            Self::Hls => "hls",
            Self::HlsCopy => "hls-copy",
            Self::DashVideo => "dash-v",
            Self::DashAudio => "dash-a",
        }
    }

    pub fn segment_type(self) -> SegmentType {
        match self {
            Self::Hls | Self::HlsCopy => SegmentType::Ts,
            Self::DashVideo => SegmentType::WebmVideo,
            Self::DashAudio => SegmentType::WebmAudio,
        }
    }

    pub fn is_dash(self) -> bool {
        matches!(self, Self::DashVideo | Self::DashAudio)
    }

    pub fn manifest_mime(self) -> &'static str {
        if self.is_dash() {
            MIME_DASH
        } else {
            MIME_HLS
        }
    }

    /// The variant that actually produces `token`.
    ///
    /// DASH manifests list both tracks under one URL, so the track is picked
    /// by the token's suffix.
    pub fn for_segment_token(self, token: &str) -> StreamType {
        if !self.is_dash() {
            return self;
        }
        if token.ends_with(SegmentType::WebmAudio.suffix()) {
            Self::DashAudio
        } else if token.ends_with(SegmentType::WebmVideo.suffix()) {
            Self::DashVideo
        } else {
            self
        }
    }

    /// Cache directory name for a source transcoded under `max_resolution`.
    pub fn dir_name(self, hash: &str, max_resolution: u32) -> String {
        if max_resolution > 0 {
            format!("{}_{}_{}", hash, self.name(), max_resolution)
        } else {
            format!("{}_{}", hash, self.name())
        }
    }

    /// Video encoder for this variant, `None` for audio-only output.
    pub fn select_codec(self, settings: &dyn TranscodeSettings) -> Option<VideoCodec> {
        let hardware = settings
            .hardware_codec()
            .filter(|_| settings.hardware_acceleration_enabled());

        match self {
            Self::Hls => Some(
                hardware
                    .filter(|c| c.hls_compatible())
                    .unwrap_or(VideoCodec::LibX264),
            ),
            Self::HlsCopy => Some(VideoCodec::Copy),
            Self::DashVideo => Some(
                hardware
                    .filter(|c| c.webm_compatible())
                    .unwrap_or(VideoCodec::Vp9),
            ),
            Self::DashAudio => None,
        }
    }

    /// Full ffmpeg argument list for a transcode of `source` starting at
    /// segment `start`.
    pub fn transcode_args(
        self,
        source: &SourceFile,
        settings: &dyn TranscodeSettings,
        max_resolution: u32,
        start: u32,
        output_dir: &Path,
    ) -> Args {
        let codec = self.select_codec(settings);

        let mut args = Args::new();
        args.arg("-hide_banner").log_level(LogLevel::Error);
        if let Some(codec) = codec {
            args.args(codec.device_init_args().iter().copied());
        }
        args.args(settings.live_input_args());
        if start > 0 {
            args.seek(start as f64 * SEGMENT_LENGTH as f64);
        }
        args.input(&source.path);

        let filter = codec
            .map(|c| VideoFilter::for_codec(c, source.width, source.height, max_resolution))
            .unwrap_or_default();
        args.extend(self.build_args(
            codec.unwrap_or(VideoCodec::Copy),
            start,
            &filter,
            !source.has_audio(),
            output_dir,
        ));

        args.args(settings.live_output_args());
        args
    }

    /// Variant-specific arguments following the input.
    pub fn build_args(
        self,
        codec: VideoCodec,
        start: u32,
        filter: &VideoFilter,
        video_only: bool,
        output_dir: &Path,
    ) -> Args {
        let mut args = Args::new();
        let segment_type = self.segment_type();
        let temp_pattern = output_dir.join(format!(".%d{}", segment_type.suffix()));

        match self {
            Self::Hls | Self::HlsCopy => {
                let codec = if self == Self::HlsCopy {
                    VideoCodec::Copy
                } else {
                    codec
                };
                args.extend(codec.init_args());
                if codec != VideoCodec::Copy {
                    args.args(["-flags", "+cgop", "-force_key_frames", KEY_FRAME_EXPR]);
                    args.video_filter(filter);
                }
                if video_only {
                    args.skip_audio();
                } else {
                    args.args(["-c:a", "aac", "-ac", "2"]);
                }
                args.args(["-sn", "-copyts", "-avoid_negative_ts", "disabled"])
                    .format("hls")
                    .args(["-start_number".to_string(), start.to_string()])
                    .args([
                        "-hls_time",
                        "2",
                        "-hls_flags",
                        "split_by_time",
                        "-hls_segment_type",
                        "mpegts",
                        "-hls_playlist_type",
                        "vod",
                        "-hls_segment_filename",
                    ])
                    .arg(temp_pattern.to_string_lossy())
                    .arg(output_dir.join("manifest.m3u8").to_string_lossy());
            }
            Self::DashVideo => {
                args.extend(codec.init_args());
                args.args(["-force_key_frames", KEY_FRAME_EXPR]);
                args.video_filter(filter);
                args.args(["-copyts", "-avoid_negative_ts", "disabled", "-map", "0:v:0"]);
                self.webm_chunk_args(&mut args, start, output_dir);
                args.arg(temp_pattern.to_string_lossy());
            }
            Self::DashAudio => {
                args.args(["-c:a", "libopus", "-b:a", "96000", "-ar", "48000"])
                    .args(["-copyts", "-avoid_negative_ts", "disabled", "-map", "0:a:0"]);
                self.webm_chunk_args(&mut args, start, output_dir);
                args.args(["-audio_chunk_duration", "2000"]);
                args.arg(temp_pattern.to_string_lossy());
            }
        }

        args
    }

    fn webm_chunk_args(self, args: &mut Args, start: u32, output_dir: &Path) {
        // A restarted transcode must not clobber the init chunk already served.
        let init = if start == 0 { "init" } else { ".init" };
        let header = output_dir.join(format!("{}{}", init, self.segment_type().suffix()));
        args.format("webm_chunk")
            .args(["-chunk_start_index".to_string(), start.to_string()])
            .arg("-header")
            .arg(header.to_string_lossy());
    }

    /// Write the manifest players fetch before any segment.
    ///
    /// `base_url` is the manifest's own URL path; `query` is appended to every
    /// segment URL.
    pub fn write_manifest<W: Write>(
        self,
        out: &mut W,
        source: &SourceFile,
        max_resolution: u32,
        base_url: &str,
        query: Option<&str>,
    ) -> streamforge_media::Result<()> {
        let timeline = source.timeline();

        if !self.is_dash() {
            let playlist = MediaPlaylist::from_timeline(&timeline, base_url, "ts", query);
            playlist.write_to(out)?;
            return Ok(());
        }

        let (width, height) = source.scaled_dimensions(max_resolution);
        let mut mpd = Mpd::new(timeline.duration(), format!("{}/", base_url))
            .with_adaptation_set(AdaptationSet::webm_video(
                source.dash_frame_rate(),
                width,
                height,
                query,
            ));
        if source.has_audio() {
            mpd = mpd.with_adaptation_set(AdaptationSet::webm_audio(query));
        }
        mpd.write_to(out)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for StreamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hls" => Ok(Self::Hls),
            "hls-copy" => Ok(Self::HlsCopy),
            "dash" | "dash-v" => Ok(Self::DashVideo),
            "dash-a" => Ok(Self::DashAudio),
            other => Err(format!("unknown stream type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use streamforge_common::StreamingResolution;

    #[derive(Default)]
    struct Settings {
        hardware: Option<VideoCodec>,
        enabled: bool,
        input: Vec<String>,
        output: Vec<String>,
    }

    impl TranscodeSettings for Settings {
        fn max_streaming_transcode_size(&self) -> StreamingResolution {
            StreamingResolution::Original
        }
        fn hardware_acceleration_enabled(&self) -> bool {
            self.enabled
        }
        fn hardware_codec(&self) -> Option<VideoCodec> {
            self.hardware
        }
        fn live_input_args(&self) -> Vec<String> {
            self.input.clone()
        }
        fn live_output_args(&self) -> Vec<String> {
            self.output.clone()
        }
    }

    fn source(audio: Option<&str>) -> SourceFile {
        SourceFile {
            hash: "abc".to_string(),
            path: PathBuf::from("/media/movie.mkv"),
            duration: 81.5,
            width: 1920,
            height: 1080,
            frame_rate: Some(23.976),
            avg_frame_rate: Some("24000/1001".to_string()),
            video_codec: Some("h264".to_string()),
            audio_codec: audio.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("hls".parse::<StreamType>(), Ok(StreamType::Hls));
        assert_eq!("dash".parse::<StreamType>(), Ok(StreamType::DashVideo));
        assert_eq!("dash-a".parse::<StreamType>(), Ok(StreamType::DashAudio));
        assert!("mp4".parse::<StreamType>().is_err());
        for t in StreamType::ALL {
            assert_eq!(t.name().parse::<StreamType>(), Ok(t));
        }
    }

    #[test]
    fn test_token_selects_dash_track() {
        assert_eq!(
            StreamType::DashVideo.for_segment_token("3_a.webm"),
            StreamType::DashAudio
        );
        assert_eq!(
            StreamType::DashVideo.for_segment_token("init_v.webm"),
            StreamType::DashVideo
        );
        assert_eq!(StreamType::Hls.for_segment_token("3_a.webm"), StreamType::Hls);
    }

    #[test]
    fn test_dir_name() {
        assert_eq!(StreamType::Hls.dir_name("abc", 0), "abc_hls");
        assert_eq!(StreamType::DashAudio.dir_name("abc", 720), "abc_dash-a_720");
    }

    #[test]
    fn test_codec_selection() {
        let mut settings = Settings::default();
        assert_eq!(StreamType::Hls.select_codec(&settings), Some(VideoCodec::LibX264));
        assert_eq!(StreamType::DashVideo.select_codec(&settings), Some(VideoCodec::Vp9));
        assert_eq!(StreamType::DashAudio.select_codec(&settings), None);

        settings.hardware = Some(VideoCodec::H264Vaapi);
        assert_eq!(StreamType::Hls.select_codec(&settings), Some(VideoCodec::LibX264));

        settings.enabled = true;
        assert_eq!(StreamType::Hls.select_codec(&settings), Some(VideoCodec::H264Vaapi));
        // Not WebM-capable, so DASH stays on software VP9.
        assert_eq!(StreamType::DashVideo.select_codec(&settings), Some(VideoCodec::Vp9));
        assert_eq!(StreamType::HlsCopy.select_codec(&settings), Some(VideoCodec::Copy));
    }

    #[test]
    fn test_hls_args_from_start() {
        let settings = Settings::default();
        let args = StreamType::Hls.transcode_args(
            &source(Some("aac")),
            &settings,
            720,
            0,
            Path::new("/cache/abc_hls_720"),
        );
        let line = args.to_string();

        assert!(line.starts_with("-hide_banner -loglevel error -i /media/movie.mkv -c:v libx264"));
        assert!(args.position("-ss").is_none());
        assert_eq!(args.value_of("-vf"), Some("scale=-2:720"));
        assert_eq!(args.value_of("-force_key_frames"), Some(KEY_FRAME_EXPR));
        assert_eq!(args.value_of("-c:a"), Some("aac"));
        assert_eq!(args.value_of("-start_number"), Some("0"));
        assert_eq!(
            args.value_of("-hls_segment_filename"),
            Some("/cache/abc_hls_720/.%d.ts")
        );
        assert!(line.ends_with("/cache/abc_hls_720/manifest.m3u8"));
    }

    #[test]
    fn test_hls_args_seek_and_extra_args() {
        let settings = Settings {
            input: vec!["-re".to_string()],
            output: vec!["-threads".to_string(), "2".to_string()],
            ..Default::default()
        };
        let args = StreamType::Hls.transcode_args(
            &source(None),
            &settings,
            0,
            20,
            Path::new("/cache/abc_hls"),
        );

        assert_eq!(args.value_of("-ss"), Some("40"));
        assert!(args.position("-re") < args.position("-i"));
        assert!(args.position("-an").is_some());
        assert!(args.position("-vf").is_none());
        assert_eq!(args.value_of("-start_number"), Some("20"));
        assert!(args.to_string().ends_with("manifest.m3u8 -threads 2"));
    }

    #[test]
    fn test_hls_copy_args() {
        let args = StreamType::HlsCopy.transcode_args(
            &source(Some("aac")),
            &Settings::default(),
            480,
            0,
            Path::new("/cache/x"),
        );
        assert_eq!(args.value_of("-c:v"), Some("copy"));
        assert!(args.position("-force_key_frames").is_none());
        assert!(args.position("-vf").is_none());
    }

    #[test]
    fn test_hardware_device_args_precede_input() {
        let settings = Settings {
            hardware: Some(VideoCodec::H264Vaapi),
            enabled: true,
            ..Default::default()
        };
        let args = StreamType::Hls.transcode_args(
            &source(Some("aac")),
            &settings,
            720,
            0,
            Path::new("/cache/x"),
        );
        assert!(args.position("-vaapi_device") < args.position("-i"));
        assert_eq!(
            args.value_of("-vf"),
            Some("format=nv12,hwupload,scale_vaapi=-2:720")
        );
    }

    #[test]
    fn test_dash_video_init_naming() {
        let dir = Path::new("/cache/abc_dash-v");
        let first = StreamType::DashVideo.build_args(
            VideoCodec::Vp9,
            0,
            &VideoFilter::default(),
            false,
            dir,
        );
        assert_eq!(first.value_of("-header"), Some("/cache/abc_dash-v/init_v.webm"));
        assert_eq!(first.value_of("-chunk_start_index"), Some("0"));
        assert_eq!(first.value_of("-map"), Some("0:v:0"));
        assert_eq!(
            first.as_slice().last().map(String::as_str),
            Some("/cache/abc_dash-v/.%d_v.webm")
        );

        let restarted = StreamType::DashVideo.build_args(
            VideoCodec::Vp9,
            12,
            &VideoFilter::default(),
            false,
            dir,
        );
        assert_eq!(
            restarted.value_of("-header"),
            Some("/cache/abc_dash-v/.init_v.webm")
        );
    }

    #[test]
    fn test_dash_audio_args() {
        let args = StreamType::DashAudio.transcode_args(
            &source(Some("aac")),
            &Settings::default(),
            0,
            3,
            Path::new("/cache/abc_dash-a"),
        );
        assert!(args.position("-c:v").is_none());
        assert_eq!(args.value_of("-c:a"), Some("libopus"));
        assert_eq!(args.value_of("-map"), Some("0:a:0"));
        assert_eq!(args.value_of("-audio_chunk_duration"), Some("2000"));
        assert_eq!(args.value_of("-ss"), Some("6"));
    }

    #[test]
    fn test_hls_manifest() {
        let mut out = String::new();
        StreamType::Hls
            .write_manifest(
                &mut out,
                &source(Some("aac")),
                720,
                "/api/stream/abc/hls",
                Some("resolution=STANDARD_HD"),
            )
            .unwrap();

        assert_eq!(out.matches("#EXTINF").count(), 41);
        assert!(out.contains("/api/stream/abc/hls/40.ts?resolution=STANDARD_HD"));
        assert!(out.contains("#EXTINF:1.500000,"));
    }

    #[test]
    fn test_dash_manifest() {
        let mut out = String::new();
        StreamType::DashVideo
            .write_manifest(&mut out, &source(Some("aac")), 720, "/api/stream/abc/dash", None)
            .unwrap();
        assert!(out.contains("<BaseURL>/api/stream/abc/dash/</BaseURL>"));
        assert!(out.contains("width=\"1280\" height=\"720\""));
        assert!(out.contains("audio/webm"));

        let mut silent = String::new();
        StreamType::DashVideo
            .write_manifest(&mut silent, &source(None), 0, "/s", None)
            .unwrap();
        assert!(!silent.contains("audio/webm"));
        assert!(silent.contains("width=\"1920\" height=\"1080\""));
    }
}
