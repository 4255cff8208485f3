//! Per-stream state: pending segment requests and the transcode serving them.

use super::process::{Launch, TranscodeProcess};
use super::segment_type::SegmentIndex;
use super::source::SourceFile;
use super::stream_type::StreamType;
use super::{StreamTuning, TranscodeSettings};
use crate::lock::ReadLockManager;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use streamforge_av::FFMpeg;
use streamforge_common::{Error, Result};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Identity of a running stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StreamKey {
    pub hash: String,
    pub stream_type: StreamType,
    /// Resolution cap in pixels, 0 for none.
    pub max_resolution: u32,
}

impl StreamKey {
    pub fn new(hash: impl Into<String>, stream_type: StreamType, max_resolution: u32) -> Self {
        Self {
            hash: hash.into(),
            stream_type,
            max_resolution,
        }
    }

    pub fn dir_name(&self) -> String {
        self.stream_type.dir_name(&self.hash, self.max_resolution)
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// Shared dependencies for starting transcodes.
pub struct Launcher {
    pub ffmpeg: FFMpeg,
    pub settings: Arc<dyn TranscodeSettings>,
    pub locks: ReadLockManager,
    /// Parent of every read lock; cancelled on shutdown.
    pub root: CancellationToken,
    pub tuning: StreamTuning,
}

/// A client waiting for one segment.
pub struct WaitingSegment {
    index: SegmentIndex,
    path: PathBuf,
    accessed_at: Instant,
    sender: Mutex<Option<oneshot::Sender<Result<PathBuf>>>>,
    done: AtomicBool,
}

impl WaitingSegment {
    fn new(index: SegmentIndex, path: PathBuf, now: Instant) -> (Arc<Self>, oneshot::Receiver<Result<PathBuf>>) {
        let (tx, rx) = oneshot::channel();
        let waiter = Arc::new(Self {
            index,
            path,
            accessed_at: now,
            sender: Mutex::new(Some(tx)),
            done: AtomicBool::new(false),
        });
        (waiter, rx)
    }

    pub fn index(&self) -> SegmentIndex {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Deliver the outcome. Only the first call has any effect.
    pub fn complete(&self, result: Result<PathBuf>) -> bool {
        if self.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(result);
        }
        true
    }

    /// The client stopped waiting.
    pub fn abandon(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.sender.lock().take();
        }
    }

    /// Complete the wait if the file is there or the wait budget is spent.
    fn settle(&self, now: Instant, tuning: &StreamTuning) -> bool {
        if self.path.exists() {
            self.complete(Ok(self.path.clone()));
            return true;
        }
        if now.saturating_duration_since(self.accessed_at) > tuning.segment_wait {
            let error = Error::SegmentTimeout {
                path: self.path.clone(),
            };
            tracing::error!(segment = %self.index, error = %error, "Segment never appeared");
            self.complete(Err(error));
            return true;
        }
        false
    }
}

/// Marks a wait abandoned when the request future goes away.
pub(crate) struct AbandonOnDrop(pub Arc<WaitingSegment>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// What the monitor should do with a stream after reconciling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Active,
    /// Idle past the limit. The stream is closed and its transcode must be
    /// drained before the directory can be reused.
    Evict,
}

struct StreamState {
    waiting: Vec<Arc<WaitingSegment>>,
    process: Option<Arc<TranscodeProcess>>,
    last_accessed: Instant,
    last_requested: Option<u32>,
    closed: bool,
}

/// A source transcoded as one stream type at one resolution.
pub struct RunningStream {
    key: StreamKey,
    created_at: DateTime<Utc>,
    source: SourceFile,
    output_dir: PathBuf,
    state: Mutex<StreamState>,
}

impl RunningStream {
    pub fn new(key: StreamKey, source: SourceFile, output_dir: PathBuf, now: Instant) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            source,
            output_dir,
            state: Mutex::new(StreamState {
                waiting: Vec::new(),
                process: None,
                last_accessed: now,
                last_requested: None,
                closed: false,
            }),
        }
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn process(&self) -> Option<Arc<TranscodeProcess>> {
        self.state.lock().process.clone()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub fn last_requested(&self) -> Option<u32> {
        self.state.lock().last_requested
    }

    /// Queue a request for `index`.
    pub fn enqueue(
        &self,
        index: SegmentIndex,
        now: Instant,
    ) -> (Arc<WaitingSegment>, oneshot::Receiver<Result<PathBuf>>) {
        let path = self
            .output_dir
            .join(self.key.stream_type.segment_type().file_name(index));
        let (waiter, rx) = WaitingSegment::new(index, path, now);

        let mut state = self.state.lock();
        if state.closed {
            waiter.complete(Err(Error::Cancelled));
            return (waiter, rx);
        }
        state.last_accessed = now;
        if let SegmentIndex::Number(n) = index {
            state.last_requested = Some(n);
        }
        state.waiting.push(Arc::clone(&waiter));
        tracing::trace!(stream = %self.key, segment = %index, "Queued segment request");

        (waiter, rx)
    }

    /// Promote finished segments of the active transcode.
    pub fn finalize_segments(&self) {
        if let Some(process) = self.process() {
            process.check_and_finalize_segments();
        }
    }

    /// Settle finished waits and make sure a transcode serves the rest.
    pub fn reconcile(self: &Arc<Self>, launcher: &Launcher, now: Instant) -> Reconciled {
        let tuning = &launcher.tuning;
        let mut state = self.state.lock();
        if state.closed {
            return Reconciled::Evict;
        }

        let waiting = std::mem::take(&mut state.waiting);
        let mut remaining = Vec::with_capacity(waiting.len());
        let mut ensured = None;

        for waiter in waiting {
            if waiter.is_done() || waiter.settle(now, tuning) {
                continue;
            }
            if ensured.is_none() {
                ensured = Some(self.ensure_transcode(&mut state, &waiter, launcher));
            }
            remaining.push(waiter);
        }
        state.waiting = remaining;

        if ensured == Some(true) {
            return Reconciled::Active;
        }

        if state.waiting.is_empty()
            && now.saturating_duration_since(state.last_accessed) > tuning.max_idle
        {
            tracing::debug!(stream = %self.key, "Stream idle, evicting");
            state.closed = true;
            return Reconciled::Evict;
        }

        if let (Some(process), Some(last)) = (&state.process, state.last_requested) {
            let ahead = process
                .caught_up_to()
                .is_some_and(|c| c > last + tuning.max_segment_buffer);
            if ahead && !process.is_cancelled() {
                tracing::debug!(stream = %self.key, last_requested = last, "Buffer full, stopping transcode");
                process.stop(tuning.cancel_timeout);
            }
        }

        Reconciled::Active
    }

    /// Returns true when a transcode was started or stopped.
    fn ensure_transcode(
        self: &Arc<Self>,
        state: &mut StreamState,
        waiter: &WaitingSegment,
        launcher: &Launcher,
    ) -> bool {
        let index = waiter.index().start_index();

        let Some(process) = state.process.clone() else {
            match self.start_transcode(index, launcher) {
                Ok(process) => state.process = Some(process),
                Err(error) => {
                    tracing::error!(stream = %self.key, segment = index, error = %error, "Could not start transcode");
                    waiter.complete(Err(error));
                }
            }
            return true;
        };

        let behind = index < process.start_segment();
        let too_far = index > process.progress() + launcher.tuning.max_segment_gap;
        if !(behind || too_far) {
            return false;
        }

        if !process.is_cancelled() {
            tracing::debug!(
                stream = %self.key,
                segment = index,
                start = process.start_segment(),
                progress = process.progress(),
                "Seek outside transcode window, restarting"
            );
            process.stop(launcher.tuning.cancel_timeout);
        }
        true
    }

    fn start_transcode(self: &Arc<Self>, start: u32, launcher: &Launcher) -> Result<Arc<TranscodeProcess>> {
        let stream_type = self.key.stream_type;
        let args = stream_type.transcode_args(
            &self.source,
            launcher.settings.as_ref(),
            self.key.max_resolution,
            start,
            &self.output_dir,
        );
        let lock = launcher.locks.read_lock(&launcher.root, &self.source.path);

        tracing::info!(stream = %self.key, segment = start, "Starting transcode");

        let stream = Arc::downgrade(self);
        TranscodeProcess::spawn(
            Launch {
                ffmpeg: &launcher.ffmpeg,
                args,
                lock,
                output_dir: self.output_dir.clone(),
                segment_type: stream_type.segment_type(),
                start_segment: start,
                label: self.key.to_string(),
            },
            Box::new(move |process, failure| {
                if let Some(stream) = stream.upgrade() {
                    stream.process_exited(&process, failure);
                }
            }),
        )
    }

    fn process_exited(&self, process: &Arc<TranscodeProcess>, failure: Option<String>) {
        let mut state = self.state.lock();
        if state
            .process
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, process))
        {
            state.process = None;
        }

        let Some(message) = failure else {
            return;
        };
        for waiter in &state.waiting {
            if waiter.index().start_index() < process.start_segment() {
                continue;
            }
            if waiter.path().exists() {
                waiter.complete(Ok(waiter.path().to_path_buf()));
            } else {
                waiter.complete(Err(Error::process_exit(message.clone())));
            }
        }
    }

    /// Fail every pending wait and detach the transcode so it can be stopped.
    pub fn close(&self) -> Option<Arc<TranscodeProcess>> {
        let mut state = self.state.lock();
        state.closed = true;
        for waiter in state.waiting.drain(..) {
            waiter.complete(Err(Error::Cancelled));
        }
        state.process.take()
    }
}
