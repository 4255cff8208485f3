//! ffmpeg command factory.

use crate::args::Args;
use crate::tools::get_tool_path;
use crate::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Handle to an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FFMpeg {
    path: PathBuf,
}

impl FFMpeg {
    /// Use the ffmpeg binary at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve ffmpeg from a configured path, falling back to `PATH`.
    pub fn locate(config_path: Option<&Path>) -> Result<Self> {
        get_tool_path("ffmpeg", config_path).map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a command running ffmpeg with `args`.
    ///
    /// stdout and stderr are piped so the caller can drain them; stdin is
    /// closed so ffmpeg never waits on the terminal. The child is killed if the
    /// handle is dropped without being waited on.
    pub fn command(&self, args: &Args) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(args.as_slice())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for FFMpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}
