//! ffmpeg `-vf` filter chains.

use crate::codec::VideoCodec;

/// A comma-separated ffmpeg video filter chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFilter(String);

impl VideoFilter {
    /// Append a filter to the chain.
    pub fn append(mut self, filter: &str) -> Self {
        if !self.0.is_empty() {
            self.0.push(',');
        }
        self.0.push_str(filter);
        self
    }

    /// Cap the smaller dimension of a `width`x`height` source at `max`.
    ///
    /// Leaves the chain unchanged when `max` is 0 or the source already fits.
    pub fn scale_max(self, width: u32, height: u32, max: u32) -> Self {
        self.scale_max_with(width, height, max, VideoCodec::LibX264)
    }

    fn scale_max_with(self, width: u32, height: u32, max: u32, codec: VideoCodec) -> Self {
        let smaller = width.min(height);
        if max == 0 || max >= smaller {
            return self;
        }

        let ratio = width as f64 / height as f64;
        let dims = match (codec.needs_explicit_dimensions(), width > height) {
            (true, true) => format!("{}:{}", even((max as f64 * ratio).round() as u32), max),
            (true, false) => format!("{}:{}", max, even((max as f64 / ratio).round() as u32)),
            (false, true) => format!("-2:{}", max),
            (false, false) => format!("{}:-2", max),
        };

        self.append(&format!("{}={}", codec.scale_filter(), dims))
    }

    /// Filter chain for encoding a `width`x`height` source with `codec`
    /// under a resolution cap of `max`.
    ///
    /// Hardware encoders get their upload filters first and a device scaler.
    /// Unknown source dimensions produce an empty chain.
    pub fn for_codec(codec: VideoCodec, width: u32, height: u32, max: u32) -> Self {
        if width == 0 || height == 0 || codec == VideoCodec::Copy {
            return Self::default();
        }

        let mut filter = Self::default();
        for upload in codec.upload_filters() {
            filter = filter.append(upload);
        }
        filter.scale_max_with(width, height, max, codec)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for VideoFilter {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn even(n: u32) -> u32 {
    n + n % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_max_landscape() {
        let f = VideoFilter::default().scale_max(1920, 1080, 720);
        assert_eq!(f.as_str(), "scale=-2:720");
    }

    #[test]
    fn test_scale_max_portrait() {
        let f = VideoFilter::default().scale_max(1080, 1920, 480);
        assert_eq!(f.as_str(), "scale=480:-2");
    }

    #[test]
    fn test_scale_max_noop() {
        assert!(VideoFilter::default().scale_max(1280, 720, 0).is_empty());
        assert!(VideoFilter::default().scale_max(1280, 720, 720).is_empty());
        assert!(VideoFilter::default().scale_max(1280, 720, 1080).is_empty());
    }

    #[test]
    fn test_hardware_chain() {
        let f = VideoFilter::for_codec(VideoCodec::H264Nvenc, 1920, 1080, 720);
        assert_eq!(f.as_str(), "format=nv12,hwupload_cuda,scale_cuda=-2:720");

        let f = VideoFilter::for_codec(VideoCodec::H264Vaapi, 1920, 1080, 0);
        assert_eq!(f.as_str(), "format=nv12,hwupload");
    }

    #[test]
    fn test_explicit_dimensions() {
        let f = VideoFilter::for_codec(VideoCodec::H264Qsv, 1920, 1080, 720);
        assert_eq!(
            f.as_str(),
            "hwupload=extra_hw_frames=64,format=qsv,scale_qsv=1280:720"
        );
        // 853.33 rounds to 853, padded to even.
        let f = VideoFilter::for_codec(VideoCodec::H264VideoToolbox, 1280, 720, 480);
        assert_eq!(f.as_str(), "format=nv12,hwupload,scale_vt=854:480");
    }

    #[test]
    fn test_unknown_dimensions_or_copy() {
        assert!(VideoFilter::for_codec(VideoCodec::LibX264, 0, 0, 720).is_empty());
        assert!(VideoFilter::for_codec(VideoCodec::Copy, 1920, 1080, 720).is_empty());
    }
}
