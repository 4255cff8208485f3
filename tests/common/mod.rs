//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which catalogs one dummy source file behind a
//! fake prober and wires a full [`AppContext`] around a shell script that
//! stands in for ffmpeg. The script writes numbered temp segments the same
//! way ffmpeg does and records every launch so tests can count transcodes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use streamforge::config::Config;
use streamforge::library::Library;
use streamforge::lock::ReadLockManager;
use streamforge::server::AppContext;
use streamforge::streaming::{SegmentRequest, ServedSegment, SourceFile, StreamManager, StreamTuning, StreamType};
use streamforge_av::{AudioTrack, FFMpeg, MediaInfo, Prober, VideoTrack};
use tempfile::TempDir;

/// How the fake ffmpeg behaves.
#[derive(Debug, Clone, Copy)]
pub enum FakeTranscoder {
    /// Write segments from the start index up to the end of the source,
    /// pausing `delay` between segments, then exit successfully.
    Segments { delay: Duration },
    /// Like `Segments`, but each segment is written in two halves with
    /// `delay` between them.
    SplitSegments { delay: Duration },
    /// Never write anything and run until interrupted.
    Stall,
    /// Print to stderr and exit with status 1.
    Fail,
}

/// Prober returning fixed metadata for any path.
pub struct FakeProber {
    pub duration: f64,
    pub audio: bool,
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, path: &Path) -> streamforge_av::Result<MediaInfo> {
        Ok(MediaInfo {
            file_path: path.to_path_buf(),
            file_size: 1024,
            container: "matroska".to_string(),
            duration: Some(Duration::from_secs_f64(self.duration)),
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate: Some(25.0),
                avg_frame_rate: Some("25/1".to_string()),
            }],
            audio_tracks: if self.audio {
                vec![AudioTrack {
                    index: 1,
                    codec: "aac".to_string(),
                    channels: 2,
                    sample_rate: Some(48000),
                    language: Some("eng".to_string()),
                }]
            } else {
                Vec::new()
            },
        })
    }
}

/// Harness options.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub duration: f64,
    pub audio: bool,
    pub transcoder: FakeTranscoder,
    /// Ignore SIGINT so stopping the transcode has to wait out the grace
    /// period and kill it.
    pub ignore_interrupt: bool,
    pub tuning: StreamTuning,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            duration: 200.0,
            audio: false,
            transcoder: FakeTranscoder::Segments {
                delay: Duration::from_millis(100),
            },
            ignore_interrupt: false,
            tuning: fast_tuning(),
        }
    }
}

/// Stream timing scaled down for tests.
pub fn fast_tuning() -> StreamTuning {
    StreamTuning {
        segment_wait: Duration::from_secs(10),
        monitor_interval: Duration::from_millis(20),
        max_segment_gap: 5,
        max_segment_buffer: 15,
        max_idle: Duration::from_secs(30),
        cancel_timeout: Duration::from_secs(2),
    }
}

/// A catalogued source, a fake ffmpeg and the app context around them.
pub struct TestHarness {
    pub dir: TempDir,
    pub ctx: AppContext,
    pub hash: String,
    pub source_path: PathBuf,
    pub launch_log: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Build the harness. The stream monitor is not started.
    pub fn with_options(options: Options) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let media = dir.path().join("media");
        std::fs::create_dir(&media).expect("failed to create media dir");
        let source_path = media.join("movie.mkv");
        std::fs::write(&source_path, b"not really a movie").expect("failed to write source");

        let launch_log = dir.path().join("launches.log");
        let segments = (options.duration / 2.0).ceil() as u32;
        let ffmpeg = write_fake_ffmpeg(dir.path(), &launch_log, segments, &options);

        let mut config = Config::default();
        config.library.paths = vec![media];
        config.library.cache_dir = dir.path().join("cache");

        let library = Library::new(
            config.library.paths.clone(),
            Arc::new(FakeProber {
                duration: options.duration,
                audio: options.audio,
            }),
        );
        library.scan();
        let hash = library.add_file(&source_path).expect("failed to catalog source");

        let streams = StreamManager::new(
            config.library.cache_dir.clone(),
            FFMpeg::new(ffmpeg),
            Arc::new(config.transcode.clone()),
            ReadLockManager::new(),
            options.tuning,
        );

        let ctx = AppContext {
            config: Arc::new(config),
            library: Arc::new(library),
            streams: Arc::new(streams),
        };

        Self {
            dir,
            ctx,
            hash,
            source_path,
            launch_log,
        }
    }

    /// Build the harness and start the stream monitor.
    pub fn started(options: Options) -> Self {
        let harness = Self::with_options(options);
        harness.ctx.streams.start();
        harness
    }

    pub fn streams(&self) -> &Arc<StreamManager> {
        &self.ctx.streams
    }

    pub async fn source(&self) -> SourceFile {
        self.ctx
            .library
            .source(&self.hash)
            .await
            .expect("failed to probe source")
    }

    /// Request one segment and wait for it.
    pub async fn request(
        &self,
        stream_type: StreamType,
        token: &str,
    ) -> streamforge_common::Result<ServedSegment> {
        let source = self.source().await;
        self.ctx
            .streams
            .serve_segment(SegmentRequest {
                stream_type,
                source: &source,
                resolution: None,
                hash: &self.hash,
                token,
            })
            .await
    }

    /// Start segment of every transcode launched so far.
    pub fn launches(&self) -> Vec<u32> {
        self.launch_fields(0)
    }

    /// Process id of every transcode launched so far.
    pub fn pids(&self) -> Vec<i32> {
        self.launch_fields(1)
    }

    fn launch_fields<T: std::str::FromStr>(&self, field: usize) -> Vec<T> {
        read_launch_fields(&self.launch_log, field)
    }

    /// Number of launched transcodes still running.
    #[cfg(unix)]
    pub fn alive_transcodes(&self) -> usize {
        count_alive(&self.launch_log)
    }

    /// Sample the number of running transcodes until the watch is dropped.
    #[cfg(unix)]
    pub fn watch_transcodes(&self) -> TranscodeWatch {
        let max_alive = Arc::new(AtomicUsize::new(0));
        let task = {
            let max_alive = Arc::clone(&max_alive);
            let log = self.launch_log.clone();
            tokio::spawn(async move {
                loop {
                    max_alive.fetch_max(count_alive(&log), Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };
        TranscodeWatch { max_alive, task }
    }

    /// Directory a stream of `stream_type` writes to, without a resolution cap.
    pub fn stream_dir(&self, stream_type: StreamType) -> PathBuf {
        self.ctx
            .config
            .library
            .cache_dir
            .join(stream_type.dir_name(&self.hash, 0))
    }
}

/// Highest number of simultaneously running transcodes seen so far.
#[cfg(unix)]
pub struct TranscodeWatch {
    max_alive: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

#[cfg(unix)]
impl TranscodeWatch {
    pub fn max_alive(&self) -> usize {
        self.max_alive.load(Ordering::SeqCst)
    }
}

#[cfg(unix)]
impl Drop for TranscodeWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn read_launch_fields<T: std::str::FromStr>(log: &Path, field: usize) -> Vec<T> {
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.split_whitespace().nth(field)?.parse().ok())
        .collect()
}

#[cfg(unix)]
fn count_alive(log: &Path) -> usize {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    read_launch_fields::<i32>(log, 1)
        .into_iter()
        .filter(|pid| kill(Pid::from_raw(*pid), None).is_ok())
        .count()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Count finalized segment files in `dir`.
pub fn finalized_segments(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    !name.starts_with('.') && name.ends_with(".ts")
                })
                .count()
        })
        .unwrap_or(0)
}

fn write_fake_ffmpeg(dir: &Path, log: &Path, segments: u32, options: &Options) -> PathBuf {
    let write_segments = |write: String, delay: Duration| {
        format!(
            r#"if [ -n "$header" ]; then printf 'init' > "$header"; fi
i=$start
while [ "$i" -lt {segments} ]; do
  file=$(printf '%s' "$pattern" | sed "s/%d/$i/")
{write}
  i=$((i + 1))
  sleep {delay}
done
exit 0"#,
            segments = segments,
            write = write,
            delay = delay.as_secs_f64(),
        )
    };

    let body = match options.transcoder {
        FakeTranscoder::Segments { delay } => {
            write_segments(r#"  printf 'segment %s' "$i" > "$file""#.to_string(), delay)
        }
        FakeTranscoder::SplitSegments { delay } => write_segments(
            format!(
                r#"  printf 'segment ' > "$file"
  sleep {delay}
  printf '%s' "$i" >> "$file""#,
                delay = delay.as_secs_f64(),
            ),
            delay,
        ),
        FakeTranscoder::Stall => "while true; do sleep 0.05; done".to_string(),
        FakeTranscoder::Fail => "echo 'boom: invalid data found' >&2\nexit 1".to_string(),
    };

    // Ignored dispositions carry over to `sleep`, so only a kill stops it.
    let traps = if options.ignore_interrupt {
        "trap '' INT\ntrap 'exit 0' TERM"
    } else {
        "trap 'exit 0' INT TERM"
    };

    let script = format!(
        r#"#!/bin/sh
{traps}
start=0
pattern=""
header=""
prev=""
last=""
for arg in "$@"; do
  case "$prev" in
    -start_number|-chunk_start_index) start="$arg" ;;
    -hls_segment_filename) pattern="$arg" ;;
    -header) header="$arg" ;;
  esac
  prev="$arg"
  last="$arg"
done
if [ -z "$pattern" ]; then pattern="$last"; fi
echo "$start $$" >> "{log}"
{body}
"#,
        traps = traps,
        log = log.display(),
        body = body,
    );

    let path = dir.join("ffmpeg");
    std::fs::write(&path, script).expect("failed to write fake ffmpeg");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to mark fake ffmpeg executable");
    }
    path
}
