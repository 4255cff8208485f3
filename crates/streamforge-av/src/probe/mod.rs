//! Media file probing module.
//!
//! Probing sits behind the [`Prober`] trait so the streaming engine can be
//! driven by ffprobe in production and by canned metadata in tests.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
pub use types::*;

use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads source metadata for a media file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe the file at `path`.
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// [`Prober`] backed by the ffprobe CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: PathBuf,
}

impl FfprobeProber {
    /// Use the ffprobe binary at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: path.into(),
        }
    }

    /// Path of the ffprobe binary in use.
    pub fn path(&self) -> &Path {
        &self.ffprobe
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), "Probing media file");

        probe_with_ffprobe(&self.ffprobe, path).await
    }
}
