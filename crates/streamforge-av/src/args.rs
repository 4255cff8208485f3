//! ffmpeg argument list builder.

use crate::filter::VideoFilter;
use std::fmt;
use std::path::Path;

/// ffmpeg `-loglevel` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Error,
    Warning,
    Info,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// An ordered ffmpeg argument list.
///
/// # Example
///
/// ```
/// use streamforge_av::{Args, LogLevel};
/// use std::path::Path;
///
/// let mut args = Args::new();
/// args.arg("-hide_banner")
///     .log_level(LogLevel::Error)
///     .seek(4.0)
///     .input(Path::new("/media/movie.mkv"));
/// assert_eq!(
///     args.to_string(),
///     "-hide_banner -loglevel error -ss 4 -i /media/movie.mkv"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<String>);

impl Args {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.0.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.0.extend(iter.into_iter().map(Into::into));
        self
    }

    /// `-loglevel {level}`
    pub fn log_level(&mut self, level: LogLevel) -> &mut Self {
        self.args(["-loglevel", level.as_str()])
    }

    /// `-ss {seconds}`
    pub fn seek(&mut self, seconds: f64) -> &mut Self {
        self.args(["-ss".to_string(), format!("{}", seconds)])
    }

    /// `-i {path}`
    pub fn input(&mut self, path: &Path) -> &mut Self {
        self.arg("-i").arg(path.to_string_lossy())
    }

    /// `-vf {filter}`, skipped when the filter is empty.
    pub fn video_filter(&mut self, filter: &VideoFilter) -> &mut Self {
        if !filter.is_empty() {
            self.arg("-vf").arg(filter.as_str());
        }
        self
    }

    /// `-an`
    pub fn skip_audio(&mut self) -> &mut Self {
        self.arg("-an")
    }

    /// `-f {format}`
    pub fn format(&mut self, format: &str) -> &mut Self {
        self.args(["-f", format])
    }

    /// Borrow the arguments.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the first occurrence of `flag`.
    pub fn position(&self, flag: &str) -> Option<usize> {
        self.0.iter().position(|a| a == flag)
    }

    /// Value following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.position(flag)
            .and_then(|i| self.0.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl IntoIterator for Args {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<S: Into<String>> Extend<S> for Args {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl<S: Into<String>> FromIterator<S> for Args {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_formats_whole_seconds() {
        let mut args = Args::new();
        args.seek(40.0);
        assert_eq!(args.as_slice(), ["-ss", "40"]);
    }

    #[test]
    fn test_empty_filter_is_skipped() {
        let mut args = Args::new();
        args.video_filter(&VideoFilter::default());
        assert!(args.is_empty());

        args.video_filter(&VideoFilter::from("scale=-2:720"));
        assert_eq!(args.value_of("-vf"), Some("scale=-2:720"));
    }

    #[test]
    fn test_value_of() {
        let args: Args = ["-f", "hls", "-start_number", "7"].into_iter().collect();
        assert_eq!(args.value_of("-start_number"), Some("7"));
        assert_eq!(args.value_of("-missing"), None);
    }
}
