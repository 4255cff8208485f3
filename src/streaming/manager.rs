//! Registry of running streams and the monitor that drives them.

use super::running::{AbandonOnDrop, Launcher, Reconciled, RunningStream, StreamKey};
use super::segment_type::SegmentIndex;
use super::source::SourceFile;
use super::stream_type::StreamType;
use super::{StreamTuning, TranscodeSettings};
use crate::lock::ReadLockManager;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use streamforge_av::FFMpeg;
use streamforge_common::{Error, Result, StreamingResolution};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A rendered manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub content_type: &'static str,
    pub body: String,
}

/// A request for one segment of a source.
#[derive(Debug, Clone, Copy)]
pub struct SegmentRequest<'a> {
    pub stream_type: StreamType,
    pub source: &'a SourceFile,
    /// Requested cap; the configured default applies when absent.
    pub resolution: Option<StreamingResolution>,
    pub hash: &'a str,
    /// Segment token from the URL, e.g. `12.ts` or `init_v.webm`.
    pub token: &'a str,
}

/// A finalized segment ready to be sent.
#[derive(Debug, Clone)]
pub struct ServedSegment {
    pub path: PathBuf,
    pub mime_type: &'static str,
}

/// Snapshot of one running stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    #[serde(flatten)]
    pub key: StreamKey,
    pub created_at: DateTime<Utc>,
    pub pending: usize,
    pub transcoding: bool,
    pub start_segment: Option<u32>,
    pub caught_up_to: Option<u32>,
    pub last_requested: Option<u32>,
}

/// Owns every running stream.
pub struct StreamManager {
    cache_dir: PathBuf,
    launcher: Launcher,
    streams: Mutex<HashMap<StreamKey, Arc<RunningStream>>>,
    /// Evicted streams whose transcode is still exiting, keyed to a token
    /// cancelled once the directory is gone.
    draining: Arc<Mutex<HashMap<StreamKey, CancellationToken>>>,
    shutdown: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl StreamManager {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        ffmpeg: FFMpeg,
        settings: Arc<dyn TranscodeSettings>,
        locks: ReadLockManager,
        tuning: StreamTuning,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            launcher: Launcher {
                ffmpeg,
                settings,
                locks,
                root: CancellationToken::new(),
                tuning,
            },
            streams: Mutex::new(HashMap::new()),
            draining: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            monitor: Mutex::new(None),
        }
    }

    /// Start the background monitor. Calling it again has no effect.
    pub fn start(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return;
        }
        let manager = Arc::clone(self);
        *monitor = Some(tokio::spawn(async move { manager.run_monitor().await }));
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn tuning(&self) -> &StreamTuning {
        &self.launcher.tuning
    }

    pub fn locks(&self) -> &ReadLockManager {
        &self.launcher.locks
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolution cap in pixels and the query string that carries it.
    fn resolve_resolution(&self, requested: Option<StreamingResolution>) -> (u32, Option<String>) {
        match requested {
            Some(resolution) => (
                resolution.max_resolution(),
                Some(format!("resolution={}", resolution.as_str())),
            ),
            None => (
                self.launcher
                    .settings
                    .max_streaming_transcode_size()
                    .max_resolution(),
                None,
            ),
        }
    }

    /// Render the manifest for `source`. Never starts a transcode.
    pub fn serve_manifest(
        &self,
        stream_type: StreamType,
        source: &SourceFile,
        resolution: Option<StreamingResolution>,
        base_url: &str,
    ) -> Manifest {
        let (max_resolution, query) = self.resolve_resolution(resolution);
        let mut body = String::new();
        // Writing into a String cannot fail.
        let _ = stream_type.write_manifest(&mut body, source, max_resolution, base_url, query.as_deref());

        Manifest {
            content_type: stream_type.manifest_mime(),
            body,
        }
    }

    /// Wait for a segment to be available, transcoding it if needed.
    pub async fn serve_segment(&self, request: SegmentRequest<'_>) -> Result<ServedSegment> {
        if request.hash.is_empty() {
            return Err(Error::invalid_segment("invalid hash"));
        }

        let stream_type = request.stream_type.for_segment_token(request.token);
        let segment_type = stream_type.segment_type();
        let index = segment_type.parse(request.token)?;

        let last = request.source.timeline().last_segment();
        let in_range = match (index, last) {
            (_, None) => false,
            (SegmentIndex::Init, Some(_)) => true,
            (SegmentIndex::Number(n), Some(last)) => n <= last,
        };
        if !in_range {
            return Err(Error::invalid_segment(format!(
                "segment {} is past the end of {}",
                index, request.hash
            )));
        }

        let (max_resolution, _) = self.resolve_resolution(request.resolution);
        let key = StreamKey::new(request.hash, stream_type, max_resolution);
        let now = Instant::now();

        let (waiter, rx) = loop {
            let drained = {
                let mut streams = self.streams.lock();
                if self.shutdown.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                // An evicted stream's directory is reused only once its
                // transcode has exited and the directory is gone.
                match self.draining.lock().get(&key) {
                    Some(done) => done.clone(),
                    None => {
                        let stream = streams
                            .entry(key.clone())
                            .or_insert_with(|| {
                                tracing::debug!(stream = %key, "Creating stream");
                                Arc::new(RunningStream::new(
                                    key.clone(),
                                    request.source.clone(),
                                    self.cache_dir.join(key.dir_name()),
                                    now,
                                ))
                            })
                            .clone();

                        let (waiter, rx) = stream.enqueue(index, now);
                        stream.reconcile(&self.launcher, now);
                        break (waiter, rx);
                    }
                }
            };

            tracing::trace!(stream = %key, "Waiting for evicted stream to drain");
            tokio::select! {
                _ = drained.cancelled() => {}
                _ = self.shutdown.cancelled() => return Err(Error::Cancelled),
            }
        };

        let _guard = AbandonOnDrop(waiter);
        let path = rx.await.unwrap_or(Err(Error::Cancelled))?;

        Ok(ServedSegment {
            path,
            mime_type: segment_type.mime_type(),
        })
    }

    /// One monitor pass over every stream.
    ///
    /// Evicted streams move to the draining set until their transcode has
    /// exited and their directory is removed.
    pub fn monitor_streams(&self, now: Instant) {
        let mut evicted = Vec::new();
        {
            let mut streams = self.streams.lock();
            streams.retain(|key, stream| {
                stream.finalize_segments();
                match stream.reconcile(&self.launcher, now) {
                    Reconciled::Active => true,
                    Reconciled::Evict => {
                        tracing::info!(stream = %key, "Removed idle stream");
                        let done = CancellationToken::new();
                        self.draining.lock().insert(key.clone(), done.clone());
                        evicted.push((Arc::clone(stream), stream.close(), done));
                        false
                    }
                }
            });
        }

        let grace = self.launcher.tuning.cancel_timeout;
        for (stream, process, done) in evicted {
            let draining = Arc::clone(&self.draining);
            tokio::spawn(async move {
                if let Some(process) = process {
                    process.stop_and_wait(grace).await;
                }
                remove_stream_dir(stream.output_dir());
                draining.lock().remove(stream.key());
                done.cancel();
                tracing::debug!(stream = %stream.key(), "Stream drained");
            });
        }
    }

    /// Number of evicted streams still waiting for their transcode to exit.
    pub fn draining_count(&self) -> usize {
        self.draining.lock().len()
    }

    pub fn stream(&self, key: &StreamKey) -> Option<Arc<RunningStream>> {
        self.streams.lock().get(key).cloned()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn status(&self) -> Vec<StreamStatus> {
        let streams: Vec<Arc<RunningStream>> = self.streams.lock().values().cloned().collect();
        let mut status: Vec<StreamStatus> = streams
            .iter()
            .map(|stream| {
                let process = stream.process();
                StreamStatus {
                    key: stream.key().clone(),
                    created_at: stream.created_at(),
                    pending: stream.pending(),
                    transcoding: process.as_ref().is_some_and(|p| !p.has_exited()),
                    start_segment: process.as_ref().map(|p| p.start_segment()),
                    caught_up_to: process.as_ref().and_then(|p| p.caught_up_to()),
                    last_requested: stream.last_requested(),
                }
            })
            .collect();
        status.sort_by(|a, b| a.key.dir_name().cmp(&b.key.dir_name()));
        status
    }

    /// Stop the monitor, every transcode, and remove all stream directories.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let monitor = self.monitor.lock().take();
        match monitor {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Stream monitor ended abnormally");
                    self.stop_and_remove_all().await;
                }
            }
            None => self.stop_and_remove_all().await,
        }
    }

    async fn run_monitor(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.launcher.tuning.monitor_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(
            interval_ms = self.launcher.tuning.monitor_interval.as_millis() as u64,
            "Stream monitor started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => self.monitor_streams(Instant::now()),
            }
        }

        self.stop_and_remove_all().await;
        tracing::debug!("Stream monitor stopped");
    }

    async fn stop_and_remove_all(&self) {
        let streams: Vec<Arc<RunningStream>> = {
            let mut streams = self.streams.lock();
            streams.drain().map(|(_, stream)| stream).collect()
        };

        let grace = self.launcher.tuning.cancel_timeout;
        let stops: Vec<_> = streams
            .iter()
            .filter_map(|stream| stream.close())
            .map(|process| process.stop_and_wait(grace))
            .collect();

        if !stops.is_empty() {
            tracing::info!(count = stops.len(), "Stopping transcodes");
        }
        join_all(stops).await;

        let drains: Vec<CancellationToken> = self.draining.lock().values().cloned().collect();
        join_all(drains.iter().map(|done| done.cancelled())).await;
        self.launcher.root.cancel();

        for stream in &streams {
            remove_stream_dir(stream.output_dir());
        }
    }
}

fn remove_stream_dir(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => tracing::debug!(dir = %dir.display(), "Removed stream directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let error = Error::filesystem(dir, e);
            tracing::warn!(error = %error, "Could not remove stream directory");
        }
    }
}
