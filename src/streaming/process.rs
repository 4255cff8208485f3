//! A live ffmpeg transcode writing segments into a stream directory.

use super::segment_type::{SegmentIndex, SegmentType};
use crate::lock::ReadLock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamforge_av::{Args, FFMpeg};
use streamforge_common::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

/// Called once the subprocess has exited and been finalized. The second
/// argument carries the failure message for unexpected failures.
pub type ExitHook = Box<dyn FnOnce(Arc<TranscodeProcess>, Option<String>) + Send>;

/// Everything needed to launch a transcode.
pub struct Launch<'a> {
    pub ffmpeg: &'a FFMpeg,
    pub args: Args,
    pub lock: ReadLock,
    pub output_dir: PathBuf,
    pub segment_type: SegmentType,
    pub start_segment: u32,
    /// Stream label used in logs.
    pub label: String,
}

#[derive(Debug, Default)]
struct Progress {
    /// Index of the oldest temp file not yet promoted.
    cursor: u32,
    /// Highest index promoted by this process.
    caught_up_to: Option<u32>,
    /// Exit outcome once the process has been reaped.
    exit: Option<bool>,
}

/// A running (or recently exited) ffmpeg subprocess.
pub struct TranscodeProcess {
    label: String,
    pid: Option<u32>,
    output_dir: PathBuf,
    segment_type: SegmentType,
    start_segment: u32,
    progress: Mutex<Progress>,
    cancelled: AtomicBool,
    lock: ReadLock,
    exited: CancellationToken,
}

impl TranscodeProcess {
    /// Spawn the transcode and return immediately.
    ///
    /// The read lock travels with the process and is released when it exits
    /// or is stopped. If the output directory cannot be created or the binary
    /// cannot be spawned, the lock is released and `ProcessStart` returned.
    pub fn spawn(launch: Launch<'_>, on_exit: ExitHook) -> Result<Arc<Self>> {
        let Launch {
            ffmpeg,
            args,
            lock,
            output_dir,
            segment_type,
            start_segment,
            label,
        } = launch;

        std::fs::create_dir_all(&output_dir).map_err(|e| {
            Error::process_start(format!(
                "could not create {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        tracing::debug!(stream = %label, segment = start_segment, args = %args, "Spawning ffmpeg");

        let mut child = ffmpeg
            .command(&args)
            .spawn()
            .map_err(|e| Error::process_start(format!("{}: {}", ffmpeg.path().display(), e)))?;

        let process = Arc::new(Self {
            label,
            pid: child.id(),
            output_dir,
            segment_type,
            start_segment,
            progress: Mutex::new(Progress {
                cursor: start_segment,
                ..Default::default()
            }),
            cancelled: AtomicBool::new(false),
            lock,
            exited: CancellationToken::new(),
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::spawn(Arc::clone(&process).supervise(child, stdout, stderr, on_exit));

        Ok(process)
    }

    pub fn start_segment(&self) -> u32 {
        self.start_segment
    }

    /// Highest segment this process has finalized.
    pub fn caught_up_to(&self) -> Option<u32> {
        self.progress.lock().caught_up_to
    }

    /// Furthest point the transcode has verifiably reached.
    pub fn progress(&self) -> u32 {
        self.caught_up_to().unwrap_or(self.start_segment)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn has_exited(&self) -> bool {
        self.exited.is_cancelled()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Wait for the subprocess to be reaped.
    pub async fn wait(&self) {
        self.exited.cancelled().await
    }

    /// Promote every temp segment known to be complete.
    ///
    /// A temp file is complete once the next one exists, or once the process
    /// has exited successfully. A temp file left behind by a failed exit is
    /// deleted. If the final file already exists the temp file is discarded.
    pub fn check_and_finalize_segments(&self) {
        let mut progress = self.progress.lock();
        let mut previous: Option<u32> = None;
        let mut index = progress.cursor;

        loop {
            let temp = self.temp_path(index);
            if temp.exists() {
                if let Some(prev) = previous {
                    self.promote(prev);
                    progress.caught_up_to = Some(prev);
                }
            } else {
                if let Some(prev) = previous {
                    match progress.exit {
                        Some(true) => {
                            self.promote(prev);
                            progress.caught_up_to = Some(prev);
                        }
                        Some(false) => self.discard(&self.temp_path(prev)),
                        None => {}
                    }
                }
                break;
            }

            previous = Some(index);
            progress.cursor = index;
            index += 1;
        }
    }

    /// Stop the transcode in the background.
    pub fn stop(self: &Arc<Self>, grace: Duration) {
        if !self.mark_cancelled() {
            return;
        }
        let process = Arc::clone(self);
        tokio::spawn(async move { process.terminate(grace).await });
    }

    /// Stop the transcode and wait until it is gone.
    pub async fn stop_and_wait(self: Arc<Self>, grace: Duration) {
        if self.mark_cancelled() {
            self.terminate(grace).await;
        } else {
            self.wait().await;
        }
    }

    fn mark_cancelled(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::AcqRel);
        if first {
            tracing::debug!(stream = %self.label, "Stopping transcode");
        }
        first
    }

    async fn terminate(&self, grace: Duration) {
        if !self.has_exited() && self.interrupt() {
            match tokio::time::timeout(grace, self.wait()).await {
                Ok(()) => tracing::trace!(stream = %self.label, "Transcode exited after interrupt"),
                Err(_) => tracing::warn!(
                    stream = %self.label,
                    grace_secs = grace.as_secs_f64(),
                    "Transcode ignored interrupt, killing"
                ),
            }
        }
        self.lock.release();
        self.wait().await;
    }

    #[cfg(unix)]
    fn interrupt(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match self.pid {
            Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGINT).is_ok(),
            None => false,
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&self) -> bool {
        false
    }

    async fn supervise<O, E>(
        self: Arc<Self>,
        mut child: Child,
        stdout: Option<O>,
        stderr: Option<E>,
        on_exit: ExitHook,
    ) where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let stdout = tokio::spawn(drain(stdout));
        let stderr = tokio::spawn(drain(stderr));
        let revoked = self.lock.token().clone();

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = revoked.cancelled() => None,
        };
        let status = match status {
            Some(status) => status,
            None => {
                let _ = child.start_kill();
                child.wait().await
            }
        };

        let success = matches!(status, Ok(s) if s.success());
        self.progress.lock().exit = Some(success);
        self.exited.cancel();
        self.lock.release();

        let stdout = stdout.await.unwrap_or_default();
        let stderr = stderr.await.unwrap_or_default();

        let failure = if success || self.is_cancelled() {
            tracing::debug!(stream = %self.label, "Transcode finished");
            None
        } else {
            let output = if stderr.trim().is_empty() { stdout } else { stderr };
            let message = describe_exit(&status, output.trim());
            let error = Error::process_exit(message.clone());
            tracing::error!(stream = %self.label, error = %error, "Transcode failed");
            Some(message)
        };

        self.check_and_finalize_segments();
        on_exit(self, failure);
    }

    fn temp_path(&self, index: u32) -> PathBuf {
        self.output_dir.join(self.segment_type.temp_file_name(index))
    }

    fn promote(&self, index: u32) {
        let temp = self.temp_path(index);
        let target = self
            .output_dir
            .join(self.segment_type.file_name(SegmentIndex::Number(index)));

        if target.exists() {
            tracing::trace!(stream = %self.label, segment = index, "Segment already finalized, discarding duplicate");
            self.discard(&temp);
            return;
        }

        if let Err(e) = std::fs::rename(&temp, &target) {
            let error = Error::filesystem(&temp, e);
            tracing::warn!(stream = %self.label, segment = index, error = %error, "Could not finalize segment");
        }
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                let error = Error::filesystem(path, e);
                tracing::warn!(stream = %self.label, error = %error, "Could not remove temp segment");
            }
        }
    }
}

impl std::fmt::Debug for TranscodeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeProcess")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("start_segment", &self.start_segment)
            .field("cancelled", &self.is_cancelled())
            .field("exited", &self.has_exited())
            .finish()
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn describe_exit(status: &std::io::Result<ExitStatus>, output: &str) -> String {
    let status = match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("wait failed: {}", e),
    };
    if output.is_empty() {
        status
    } else {
        format!("{}: {}", status, output)
    }
}
