//! Catalog of streamable source files.
//!
//! Files under the configured library directories are identified by a short
//! fingerprint of their path, size and modification time. The fingerprint is
//! the `hash` segment of every stream URL. Sources are probed the first time
//! they are streamed and the descriptor is kept for later requests.

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use streamforge_av::Prober;
use streamforge_common::paths::{is_hidden, is_video_file};
use streamforge_common::{Error, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::streaming::SourceFile;

/// A catalogued file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub hash: String,
    pub path: PathBuf,
}

/// Source files available for streaming.
pub struct Library {
    roots: Vec<PathBuf>,
    prober: Arc<dyn Prober>,
    files: DashMap<String, PathBuf>,
    sources: DashMap<String, SourceFile>,
}

impl Library {
    pub fn new(roots: Vec<PathBuf>, prober: Arc<dyn Prober>) -> Self {
        Self {
            roots,
            prober,
            files: DashMap::new(),
            sources: DashMap::new(),
        }
    }

    /// Walk every library directory, returning the number of files found.
    pub fn scan(&self) -> usize {
        let mut found = 0;
        for root in &self.roots {
            if root.exists() {
                found += self.scan_directory(root);
            } else {
                warn!("Library path does not exist: {:?}", root);
            }
        }
        found
    }

    /// Catalog the video files below `path`.
    pub fn scan_directory(&self, path: &Path) -> usize {
        info!("Scanning directory: {:?}", path);
        let mut found = 0;

        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !is_video_file(entry.path()) {
                continue;
            }

            match self.add_file(entry.path()) {
                Ok(_) => found += 1,
                Err(e) => warn!("Failed to catalog {:?}: {}", entry.path(), e),
            }
        }

        info!("Scan complete: {} files in {:?}", found, path);
        found
    }

    /// Catalog a single file and return its hash.
    pub fn add_file(&self, path: &Path) -> Result<String> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::filesystem(path, e))?;
        let hash = fingerprint(path, &metadata);

        if let Some(previous) = self.files.insert(hash.clone(), path.to_path_buf()) {
            if previous != path {
                warn!(hash = %hash, "Fingerprint collision between {:?} and {:?}", previous, path);
            }
        }
        self.sources.remove(&hash);
        debug!(hash = %hash, path = %path.display(), "Catalogued source");
        Ok(hash)
    }

    pub fn path_of(&self, hash: &str) -> Option<PathBuf> {
        self.files.get(hash).map(|p| p.value().clone())
    }

    /// All catalogued files, ordered by path.
    pub fn entries(&self) -> Vec<LibraryEntry> {
        let mut entries: Vec<LibraryEntry> = self
            .files
            .iter()
            .map(|e| LibraryEntry {
                hash: e.key().clone(),
                path: e.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Descriptor for `hash`, probing the file on first use.
    pub async fn source(&self, hash: &str) -> Result<SourceFile> {
        if let Some(source) = self.sources.get(hash) {
            return Ok(source.clone());
        }

        let path = self
            .path_of(hash)
            .ok_or_else(|| Error::not_found(format!("source {}", hash)))?;

        let info = self
            .prober
            .probe(&path)
            .await
            .map_err(|e| Error::probe(&path, e.to_string()))?;

        let mut source = SourceFile::from_media_info(hash, &info);
        source.path = path;
        debug!(
            hash = %hash,
            duration = source.duration,
            width = source.width,
            height = source.height,
            "Probed source"
        );

        self.sources.insert(hash.to_string(), source.clone());
        Ok(source)
    }
}

/// Identify a file by path, size and modification time.
///
/// Returns the first 16 hex characters of the SHA-256 digest.
pub fn fingerprint(path: &Path, metadata: &Metadata) -> String {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(metadata.len().to_le_bytes());
    hasher.update(modified.to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
