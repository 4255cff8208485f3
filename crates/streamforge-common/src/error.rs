//! Common error types used throughout streamforge.
//!
//! Every failure a segment request can observe is one of these variants, so
//! the HTTP layer can map them to a status code without inspecting strings.

use std::path::PathBuf;

/// Streaming error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range segment token, or an unusable stream request.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// Source metadata could not be read.
    #[error("probe failed for {}: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    /// The transcoder could not be spawned.
    #[error("error starting transcode process: {0}")]
    ProcessStart(String),

    /// A segment file never appeared within the wait budget.
    #[error("timed out waiting for segment file {} to be generated", path.display())]
    SegmentTimeout { path: PathBuf },

    /// The transcoder exited with failure without being stopped.
    #[error("transcode process failed: {0}")]
    ProcessExit(String),

    /// Best-effort filesystem work failed.
    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request was abandoned because the stream manager shut down.
    #[error("cancelled")]
    Cancelled,

    /// The requested source is unknown.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a new InvalidSegment error.
    pub fn invalid_segment<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSegment(msg.into())
    }

    /// Create a new Probe error.
    pub fn probe<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new ProcessStart error.
    pub fn process_start<S: Into<String>>(msg: S) -> Self {
        Self::ProcessStart(msg.into())
    }

    /// Create a new ProcessExit error.
    pub fn process_exit<S: Into<String>>(msg: S) -> Self {
        Self::ProcessExit(msg.into())
    }

    /// Create a new Filesystem error.
    pub fn filesystem<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether the error was caused by the client's request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidSegment(_) | Self::NotFound(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
