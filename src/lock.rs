//! Read locks on source files.
//!
//! Every transcode holds a read lock on its source for as long as it runs.
//! Library maintenance can ask whether a file is in use, or revoke all of its
//! readers with [`ReadLockManager::cancel`], which kills the transcodes
//! holding them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

type Registry = HashMap<PathBuf, Vec<(Uuid, CancellationToken)>>;

/// Tracks active readers per source path.
#[derive(Clone, Default)]
pub struct ReadLockManager {
    readers: Arc<Mutex<Registry>>,
}

impl ReadLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader of `path`.
    ///
    /// The lock is cancelled when `parent` is cancelled, when the path is
    /// revoked, or when the returned guard is released or dropped.
    pub fn read_lock(&self, parent: &CancellationToken, path: &Path) -> ReadLock {
        let id = Uuid::new_v4();
        let token = parent.child_token();

        self.readers
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .push((id, token.clone()));

        tracing::trace!(path = %path.display(), lock_id = %id, "Acquired read lock");

        ReadLock {
            id,
            path: path.to_path_buf(),
            token,
            manager: self.clone(),
            released: AtomicBool::new(false),
        }
    }

    /// Cancel every reader of `path`, returning how many were cancelled.
    pub fn cancel(&self, path: &Path) -> usize {
        let readers = self.readers.lock().remove(path).unwrap_or_default();
        for (_, token) in &readers {
            token.cancel();
        }
        if !readers.is_empty() {
            tracing::debug!(path = %path.display(), count = readers.len(), "Cancelled read locks");
        }
        readers.len()
    }

    /// Whether any reader currently holds `path`.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.lock_count(path) > 0
    }

    pub fn lock_count(&self, path: &Path) -> usize {
        self.readers.lock().get(path).map(Vec::len).unwrap_or(0)
    }

    fn release(&self, path: &Path, id: Uuid) {
        let mut readers = self.readers.lock();
        if let Some(entries) = readers.get_mut(path) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                readers.remove(path);
            }
        }
    }
}

/// A held read lock. Released exactly once, explicitly or on drop.
pub struct ReadLock {
    id: Uuid,
    path: PathBuf,
    token: CancellationToken,
    manager: ReadLockManager,
    released: AtomicBool,
}

impl ReadLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Token cancelled once the lock is revoked or released.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the lock. Returns false if it was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        self.manager.release(&self.path, self.id);
        tracing::trace!(path = %self.path.display(), lock_id = %self.id, "Released read lock");
        true
    }
}

impl Drop for ReadLock {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ReadLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadLock")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("released", &self.is_released())
            .finish()
    }
}
