//! Streaming resolution buckets.
//!
//! A bucket caps the smaller dimension of transcoded output. `Original`
//! means no cap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum output resolution for a live transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingResolution {
    /// 240p
    Low,
    /// 480p
    Standard,
    /// 720p
    StandardHd,
    /// 1080p
    FullHd,
    /// 2160p
    FourK,
    /// Source resolution.
    #[default]
    Original,
}

impl StreamingResolution {
    /// All buckets, smallest first.
    pub const ALL: [StreamingResolution; 6] = [
        Self::Low,
        Self::Standard,
        Self::StandardHd,
        Self::FullHd,
        Self::FourK,
        Self::Original,
    ];

    /// Cap on the smaller output dimension in pixels, 0 for no cap.
    pub fn max_resolution(self) -> u32 {
        match self {
            Self::Low => 240,
            Self::Standard => 480,
            Self::StandardHd => 720,
            Self::FullHd => 1080,
            Self::FourK => 2160,
            Self::Original => 0,
        }
    }

    /// Canonical name as used in query strings and config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Standard => "STANDARD",
            Self::StandardHd => "STANDARD_HD",
            Self::FullHd => "FULL_HD",
            Self::FourK => "FOUR_K",
            Self::Original => "ORIGINAL",
        }
    }
}

impl fmt::Display for StreamingResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamingResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == upper)
            .ok_or_else(|| format!("unknown streaming resolution: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_resolution() {
        assert_eq!(StreamingResolution::Low.max_resolution(), 240);
        assert_eq!(StreamingResolution::StandardHd.max_resolution(), 720);
        assert_eq!(StreamingResolution::FourK.max_resolution(), 2160);
        assert_eq!(StreamingResolution::Original.max_resolution(), 0);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(
            "full_hd".parse::<StreamingResolution>().unwrap(),
            StreamingResolution::FullHd
        );
        assert_eq!(
            "STANDARD".parse::<StreamingResolution>().unwrap(),
            StreamingResolution::Standard
        );
        assert!("1080p".parse::<StreamingResolution>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&StreamingResolution::StandardHd).unwrap();
        assert_eq!(json, "\"STANDARD_HD\"");
        let parsed: StreamingResolution = serde_json::from_str("\"FOUR_K\"").unwrap();
        assert_eq!(parsed, StreamingResolution::FourK);
    }
}
