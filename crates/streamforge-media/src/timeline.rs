//! Fixed-length segment timeline.

/// Length of every segment but the last, in seconds.
pub const SEGMENT_LENGTH: u32 = 2;

/// The segment layout of a source of known duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    duration: f64,
}

impl Timeline {
    /// Timeline for a source lasting `duration` seconds.
    ///
    /// Negative or non-finite durations are treated as empty.
    pub fn new(duration: f64) -> Self {
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        Self { duration }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// `ceil(duration / SEGMENT_LENGTH)`
    pub fn segment_count(&self) -> u32 {
        (self.duration / SEGMENT_LENGTH as f64).ceil() as u32
    }

    /// Highest valid segment index, `None` for an empty source.
    pub fn last_segment(&self) -> Option<u32> {
        self.segment_count().checked_sub(1)
    }

    /// Duration of segment `index`, the remainder for the last one.
    pub fn segment_duration(&self, index: u32) -> Option<f64> {
        if index >= self.segment_count() {
            return None;
        }
        let start = self.start_time(index);
        Some((self.duration - start).min(SEGMENT_LENGTH as f64))
    }

    /// Source timestamp where segment `index` begins.
    pub fn start_time(&self, index: u32) -> f64 {
        index as f64 * SEGMENT_LENGTH as f64
    }

    /// `(index, duration)` for every segment in order.
    pub fn segments(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        (0..self.segment_count()).filter_map(move |i| self.segment_duration(i).map(|d| (i, d)))
    }
}
