//! File watcher background task.
//!
//! Watches configured source directories recursively, feeds creation and
//! modification events through the [`SettleTracker`], and runs the pipeline
//! for each settled file. The notify backend delivers events on its own
//! thread into a bounded channel; settling evaluation and processing happen
//! on the monitor task, so the delivery thread never sleeps.

pub mod settle;

pub use settle::{is_ignored, DueCheck, SettleTracker, WatchEvent};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pl_core::events::{EventBus, EventPayload};
use pl_core::{Error, MediaKind, Result};

use crate::config::{Config, DirectoryConfig};
use crate::pipeline::Pipeline;
use crate::redo::RedoLog;

/// How long `stop` waits for the monitor task to wind down.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the monitor loop needs to process a settled file.
struct MonitorContext {
    directories: Vec<DirectoryConfig>,
    default_dest_dir: Option<PathBuf>,
    ignore_patterns: Vec<String>,
    pipeline: Arc<Pipeline>,
    redo: Arc<RedoLog>,
    events: Arc<EventBus>,
}

/// Running directory monitor. Dropping the handle leaves the task running;
/// use [`Monitor::stop`] for an orderly shutdown.
///
/// Directory configuration is captured at start and immutable for the
/// monitor's lifetime; applying a config change means stop + start, and
/// in-flight settling windows are abandoned across the restart.
#[derive(Debug)]
pub struct Monitor {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl Monitor {
    /// Start watching. Fails only when there is nothing valid to watch or
    /// the notification backend cannot be created at all.
    pub fn start(
        config: &Config,
        pipeline: Arc<Pipeline>,
        redo: Arc<RedoLog>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let watch_dirs: Vec<PathBuf> = config
            .directories
            .iter()
            .map(|d| d.source_dir.clone())
            .filter(|p| {
                let ok = !p.as_os_str().is_empty() && p.exists();
                if !ok {
                    tracing::warn!("Watch path does not exist: {}", p.display());
                }
                ok
            })
            .collect();

        if watch_dirs.is_empty() {
            return Err(Error::watch("no valid directories to watch"));
        }

        let (tx, rx) = mpsc::channel::<WatchEvent>(256);
        let healthy = Arc::new(AtomicBool::new(true));
        let watcher = spawn_backend(&watch_dirs, tx.clone(), healthy.clone())?;

        events.broadcast(EventPayload::MonitorStarted {
            directories: watch_dirs.iter().map(|p| p.display().to_string()).collect(),
        });
        for dir in &watch_dirs {
            tracing::info!("Watching directory: {}", dir.display());
        }

        let ctx = MonitorContext {
            directories: config.directories.clone(),
            default_dest_dir: config.default_dest_dir.clone(),
            ignore_patterns: config.ignore_patterns.clone(),
            pipeline,
            redo,
            events,
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            ctx,
            watcher,
            watch_dirs,
            rx,
            tx,
            healthy,
            cancel.clone(),
            Duration::from_secs(config.watch.create_settle_secs),
            Duration::from_secs(config.watch.modify_settle_secs),
        ));

        Ok(Self { cancel, handle })
    }

    /// Whether the monitor task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Request shutdown and join with a bounded timeout. A settling check
    /// already mid-placement completes before the task exits.
    pub async fn stop(self) {
        self.cancel.cancel();
        if tokio::time::timeout(STOP_TIMEOUT, self.handle).await.is_err() {
            tracing::warn!("Monitor task did not stop within {STOP_TIMEOUT:?}");
        }
        tracing::info!("File monitor stopped");
    }
}

/// Create the notify backend and attach every watch directory.
fn spawn_backend(
    paths: &[PathBuf],
    tx: mpsc::Sender<WatchEvent>,
    healthy: Arc<AtomicBool>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                let make: Option<fn(PathBuf) -> WatchEvent> = if event.kind.is_create() {
                    Some(WatchEvent::Created)
                } else if event.kind.is_modify() {
                    Some(WatchEvent::Modified)
                } else {
                    None
                };
                if let Some(make) = make {
                    for path in event.paths {
                        // Backpressure: a full channel blocks the notify
                        // thread until the monitor loop drains.
                        let _ = tx.blocking_send(make(path));
                    }
                }
            }
            Err(e) => {
                tracing::error!("Watch backend error: {e}");
                healthy.store(false, Ordering::SeqCst);
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| Error::watch(format!("failed to create file watcher: {e}")))?;

    let mut attached = 0usize;
    for path in paths {
        match watcher.watch(path, RecursiveMode::Recursive) {
            Ok(()) => attached += 1,
            Err(e) => tracing::warn!("Failed to watch {}: {e}", path.display()),
        }
    }
    if attached == 0 {
        return Err(Error::watch("failed to attach any watch directory"));
    }

    Ok(watcher)
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    ctx: MonitorContext,
    mut watcher: RecommendedWatcher,
    watch_dirs: Vec<PathBuf>,
    mut rx: mpsc::Receiver<WatchEvent>,
    tx: mpsc::Sender<WatchEvent>,
    healthy: Arc<AtomicBool>,
    cancel: CancellationToken,
    create_delay: Duration,
    modify_window: Duration,
) {
    let mut tracker = SettleTracker::new(create_delay, modify_window);
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            Some(event) = rx.recv() => {
                intake(&mut tracker, event, &ctx.ignore_patterns);
            }

            _ = tick.tick() => {
                for (path, check) in tracker.take_due(Instant::now()) {
                    if !evaluate(&path, check) {
                        tracing::debug!("Not settled, dropping: {}", path.display());
                        continue;
                    }
                    tracing::info!("File settled: {}", path.display());
                    ctx.events.broadcast(EventPayload::FileSettled { path: path.clone() });
                    process_settled(&ctx, &path).await;
                }

                // Liveness: recreate a dead backend in place.
                if !healthy.swap(true, Ordering::SeqCst) {
                    tracing::warn!("Watch backend died, restarting");
                    match spawn_backend(&watch_dirs, tx.clone(), healthy.clone()) {
                        Ok(new_watcher) => {
                            watcher = new_watcher;
                            ctx.events.broadcast(EventPayload::WatcherRestarted);
                        }
                        Err(e) => {
                            tracing::error!("Failed to restart watch backend: {e}");
                            healthy.store(false, Ordering::SeqCst);
                        }
                    }
                }
            }
        }
    }

    ctx.events.broadcast(EventPayload::MonitorStopped);
    drop(watcher);
}

/// Apply ignore rules and feed an event into the tracker.
fn intake(tracker: &mut SettleTracker, event: WatchEvent, ignore_patterns: &[String]) {
    let path = event.path();
    if is_ignored(path, ignore_patterns) {
        tracing::debug!("Ignoring: {}", path.display());
        return;
    }
    if path.is_dir() {
        return;
    }

    match event {
        WatchEvent::Created(path) => tracker.observe_created(path, Instant::now()),
        WatchEvent::Modified(path) => {
            // Capture the mtime at event time; the settling check later
            // verifies it has not moved.
            let Ok(mtime) = std::fs::metadata(&path).and_then(|m| m.modified()) else {
                return;
            };
            tracker.observe_modified(path, mtime, Instant::now());
        }
    }
}

/// Filesystem side of the settling heuristic.
fn evaluate(path: &Path, check: DueCheck) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    match check {
        DueCheck::Created => meta.len() > 0,
        DueCheck::Modified { mtime } => meta.modified().map(|cur| cur == mtime).unwrap_or(false),
    }
}

/// Route a settled file and run it through the pipeline.
async fn process_settled(ctx: &MonitorContext, path: &Path) {
    let Some((dest_root, kind_hint)) = route(path, &ctx.directories, ctx.default_dest_dir.as_deref())
    else {
        tracing::warn!("No destination configured for {}; skipping", path.display());
        return;
    };

    let result = ctx.pipeline.process_file(path, &dest_root, kind_hint).await;

    if !result.success {
        if let Some(entry) = ctx.redo.record(&result) {
            ctx.events.broadcast(EventPayload::RedoRecorded { id: entry.id });
        }
    }
    ctx.events.broadcast(EventPayload::FileProcessed { result });
}

/// First directory config whose source is a path prefix wins; otherwise the
/// global default destination.
fn route(
    path: &Path,
    directories: &[DirectoryConfig],
    default_dest: Option<&Path>,
) -> Option<(PathBuf, Option<MediaKind>)> {
    for dir in directories {
        if !dir.source_dir.as_os_str().is_empty() && path.starts_with(&dir.source_dir) {
            return Some((dir.dest_dir.clone(), dir.media_type));
        }
    }
    default_dest
        .filter(|d| !d.as_os_str().is_empty())
        .map(|d| (d.to_path_buf(), None))
}
