//! Error types for streamforge-media.

use thiserror::Error;

/// Result type for streamforge-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for streamforge-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Writing a manifest failed.
    #[error("failed to write manifest: {0}")]
    Write(#[from] std::fmt::Error),
}
