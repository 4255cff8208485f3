//! Static MPD documents for chunked WebM output.

use crate::timeline::SEGMENT_LENGTH;
use crate::Result;
use std::fmt::Write;

const PROFILE_LIVE: &str = "urn:mpeg:dash:profile:isoff-live:2011";

/// A single-period static MPD.
#[derive(Debug, Clone)]
pub struct Mpd {
    /// Presentation duration in seconds.
    pub duration: f64,
    /// Minimum buffer time in seconds.
    pub min_buffer_time: f64,
    /// Base URL every template is resolved against.
    pub base_url: String,
    pub adaptation_sets: Vec<AdaptationSet>,
}

/// One track of the presentation.
#[derive(Debug, Clone)]
pub struct AdaptationSet {
    pub mime_type: String,
    /// Language tag, audio only.
    pub lang: Option<String>,
    pub segment_template: SegmentTemplate,
    pub representation: Representation,
}

/// Numbered segment addressing.
#[derive(Debug, Clone)]
pub struct SegmentTemplate {
    /// Segment duration in `timescale` units.
    pub duration: u32,
    pub initialization: String,
    pub media: String,
    pub start_number: u32,
    pub timescale: u32,
}

/// The single encoding offered for a track.
#[derive(Debug, Clone)]
pub enum Representation {
    Video {
        id: String,
        bandwidth: u32,
        codecs: String,
        frame_rate: String,
        width: u32,
        height: u32,
    },
    Audio {
        id: String,
        sampling_rate: u32,
        bandwidth: u32,
        codecs: String,
    },
}

impl SegmentTemplate {
    /// Template for chunks named `init{suffix}` and `$Number${suffix}`,
    /// each followed by `?{query}` when a query is given.
    pub fn numbered(suffix: &str, query: Option<&str>) -> Self {
        let query = query.map(|q| format!("?{}", q)).unwrap_or_default();
        Self {
            duration: SEGMENT_LENGTH,
            initialization: format!("init{}{}", suffix, query),
            media: format!("$Number${}{}", suffix, query),
            start_number: 0,
            timescale: 1,
        }
    }
}

impl AdaptationSet {
    /// VP9 video track served as `N_v.webm` chunks.
    pub fn webm_video(frame_rate: String, width: u32, height: u32, query: Option<&str>) -> Self {
        Self {
            mime_type: "video/webm".to_string(),
            lang: None,
            segment_template: SegmentTemplate::numbered("_v.webm", query),
            representation: Representation::Video {
                id: "0".to_string(),
                bandwidth: 200_000,
                codecs: "vp09.00.40.08".to_string(),
                frame_rate,
                width,
                height,
            },
        }
    }

    /// Opus audio track served as `N_a.webm` chunks.
    pub fn webm_audio(query: Option<&str>) -> Self {
        Self {
            mime_type: "audio/webm".to_string(),
            lang: Some("und".to_string()),
            segment_template: SegmentTemplate::numbered("_a.webm", query),
            representation: Representation::Audio {
                id: "1".to_string(),
                sampling_rate: 48_000,
                bandwidth: 96_000,
                codecs: "opus".to_string(),
            },
        }
    }
}

impl Mpd {
    pub fn new(duration: f64, base_url: impl Into<String>) -> Self {
        Self {
            duration,
            min_buffer_time: 4.0,
            base_url: base_url.into(),
            adaptation_sets: Vec::new(),
        }
    }

    pub fn with_adaptation_set(mut self, set: AdaptationSet) -> Self {
        self.adaptation_sets.push(set);
        self
    }

    /// Write the XML document to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(
            out,
            "<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\" profiles=\"{}\" type=\"static\" \
             mediaPresentationDuration=\"PT{:.3}S\" minBufferTime=\"PT{:.1}S\">",
            PROFILE_LIVE, self.duration, self.min_buffer_time
        )?;
        writeln!(out, "  <BaseURL>{}</BaseURL>", escape(&self.base_url))?;
        writeln!(out, "  <Period>")?;

        for set in &self.adaptation_sets {
            write!(out, "    <AdaptationSet mimeType=\"{}\"", set.mime_type)?;
            if let Some(ref lang) = set.lang {
                write!(out, " lang=\"{}\"", escape(lang))?;
            }
            if matches!(set.representation, Representation::Video { .. }) {
                write!(out, " scanType=\"progressive\"")?;
            }
            writeln!(out, " segmentAlignment=\"true\" startWithSAP=\"1\">")?;

            let t = &set.segment_template;
            writeln!(
                out,
                "      <SegmentTemplate duration=\"{}\" initialization=\"{}\" media=\"{}\" \
                 startNumber=\"{}\" timescale=\"{}\"/>",
                t.duration,
                escape(&t.initialization),
                escape(&t.media),
                t.start_number,
                t.timescale
            )?;

            match &set.representation {
                Representation::Video {
                    id,
                    bandwidth,
                    codecs,
                    frame_rate,
                    width,
                    height,
                } => writeln!(
                    out,
                    "      <Representation id=\"{}\" bandwidth=\"{}\" codecs=\"{}\" \
                     frameRate=\"{}\" width=\"{}\" height=\"{}\"/>",
                    id, bandwidth, codecs, frame_rate, width, height
                )?,
                Representation::Audio {
                    id,
                    sampling_rate,
                    bandwidth,
                    codecs,
                } => writeln!(
                    out,
                    "      <Representation id=\"{}\" audioSamplingRate=\"{}\" bandwidth=\"{}\" \
                     codecs=\"{}\"/>",
                    id, sampling_rate, bandwidth, codecs
                )?,
            }

            writeln!(out, "    </AdaptationSet>")?;
        }

        writeln!(out, "  </Period>")?;
        writeln!(out, "</MPD>")?;
        Ok(())
    }

    /// Render to an XML string.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }
}

/// Express a floating-point frame rate as the rational DASH expects.
///
/// Rates just under a whole number are usually NTSC `N*1000/1001` rates and
/// are snapped to that form.
pub fn frame_rate_ratio(fps: f64) -> String {
    let scaled = fps * 1.001;
    let whole = scaled.trunc();
    let frac = scaled - whole;

    if frac < 0.005 {
        format!("{}/1001", whole as u64 * 1000)
    } else if frac > 0.995 {
        format!("{}/1001", (whole as u64 + 1) * 1000)
    } else {
        format!("{}/1000", (fps * 1000.0) as u64)
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
