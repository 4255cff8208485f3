//! On-disk segment families and their naming rules.

use std::fmt;
use streamforge_common::{Error, Result};

/// Index of a requested segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentIndex {
    /// The WebM initialization chunk.
    Init,
    Number(u32),
}

impl SegmentIndex {
    pub fn number(self) -> Option<u32> {
        match self {
            Self::Init => None,
            Self::Number(n) => Some(n),
        }
    }

    /// Segment a transcode has to start from to produce this one.
    pub fn start_index(self) -> u32 {
        self.number().unwrap_or(0)
    }
}

impl fmt::Display for SegmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A family of segment files written by one kind of transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// MPEG-TS segments for HLS.
    Ts,
    /// WebM video chunks for DASH.
    WebmVideo,
    /// WebM audio chunks for DASH.
    WebmAudio,
}

impl SegmentType {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Ts => "video/mp2t",
            Self::WebmVideo => "video/webm",
            Self::WebmAudio => "audio/webm",
        }
    }

    /// Suffix following the index in file names.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Ts => ".ts",
            Self::WebmVideo => "_v.webm",
            Self::WebmAudio => "_a.webm",
        }
    }

    /// Whether the family has an initialization chunk.
    pub fn has_init(self) -> bool {
        !matches!(self, Self::Ts)
    }

    /// Name of the finished file for `index`.
    pub fn file_name(self, index: SegmentIndex) -> String {
        format!("{}{}", index, self.suffix())
    }

    /// Name ffmpeg writes segment `n` under while it is still being produced.
    pub fn temp_file_name(self, n: u32) -> String {
        format!(".{}{}", n, self.suffix())
    }

    /// Parse a segment token from a request URL.
    ///
    /// Accepts a bare index or an index with this family's suffix; WebM
    /// families also accept `init`. Anything else is an invalid segment.
    pub fn parse(self, token: &str) -> Result<SegmentIndex> {
        let base = token.strip_suffix(self.suffix()).unwrap_or(token);

        if base == "init" {
            if self.has_init() {
                return Ok(SegmentIndex::Init);
            }
            return Err(Error::invalid_segment(format!(
                "{} has no init segment",
                token
            )));
        }

        if base.is_empty() || !base.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_segment(token.to_string()));
        }

        base.parse::<u32>()
            .map(SegmentIndex::Number)
            .map_err(|_| Error::invalid_segment(token.to_string()))
    }
}
