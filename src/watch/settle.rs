//! Settling detection, kept pure so it can be tested without real
//! filesystem timing.
//!
//! The tracker only decides *when* a path is due for its check; the monitor
//! performs the actual filesystem evaluation. Heuristic (preserved from the
//! original behavior):
//! - a created file is checked once after a short delay (exists, non-zero
//!   size);
//! - a modified file records its mtime and is checked once after a longer
//!   window (exists, mtime unchanged). No rescheduling on failure — a later
//!   modification event re-arms a fresh window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

/// Notification-source event, as delivered by the watch backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => path,
        }
    }
}

/// The check a due path must pass to count as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueCheck {
    /// File must exist with non-zero size.
    Created,
    /// File must exist with this exact modification time.
    Modified { mtime: SystemTime },
}

#[derive(Debug)]
enum Pending {
    Created { due: Instant },
    Modified { due: Instant, mtime: SystemTime },
}

/// Tracks watched paths until their settling check falls due.
///
/// A later event for the same path replaces the pending entry, pushing the
/// check out and (for modifications) refreshing the recorded mtime.
pub struct SettleTracker {
    pending: HashMap<PathBuf, Pending>,
    create_delay: Duration,
    modify_window: Duration,
}

impl SettleTracker {
    pub fn new(create_delay: Duration, modify_window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            create_delay,
            modify_window,
        }
    }

    /// Record a creation event observed at `now`.
    pub fn observe_created(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(
            path,
            Pending::Created {
                due: now + self.create_delay,
            },
        );
    }

    /// Record a modification event observed at `now`, with the file's mtime
    /// captured at event time.
    pub fn observe_modified(&mut self, path: PathBuf, mtime: SystemTime, now: Instant) {
        self.pending.insert(
            path,
            Pending::Modified {
                due: now + self.modify_window,
                mtime,
            },
        );
    }

    /// Remove and return every path whose check is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<(PathBuf, DueCheck)> {
        let due_paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, pending)| match pending {
                Pending::Created { due } | Pending::Modified { due, .. } => *due <= now,
            })
            .map(|(path, _)| path.clone())
            .collect();

        due_paths
            .into_iter()
            .filter_map(|path| {
                self.pending.remove(&path).map(|pending| {
                    let check = match pending {
                        Pending::Created { .. } => DueCheck::Created,
                        Pending::Modified { mtime, .. } => DueCheck::Modified { mtime },
                    };
                    (path, check)
                })
            })
            .collect()
    }

    /// Number of paths still waiting for their check.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Whether a path should be skipped entirely: dotfiles, `.tmp`/`.part`
/// suffixes, and configured substring patterns.
pub fn is_ignored(path: &std::path::Path, patterns: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };

    if name.starts_with('.') || name.ends_with(".tmp") || name.ends_with(".part") {
        return true;
    }

    patterns.iter().any(|p| !p.is_empty() && name.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const CREATE: Duration = Duration::from_secs(1);
    const MODIFY: Duration = Duration::from_secs(2);

    fn tracker() -> SettleTracker {
        SettleTracker::new(CREATE, MODIFY)
    }

    #[test]
    fn created_path_becomes_due_after_delay() {
        let mut t = tracker();
        let start = Instant::now();
        t.observe_created(PathBuf::from("/w/a.mkv"), start);

        assert!(t.take_due(start).is_empty());
        assert!(t.take_due(start + CREATE / 2).is_empty());

        let due = t.take_due(start + CREATE);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, PathBuf::from("/w/a.mkv"));
        assert_eq!(due[0].1, DueCheck::Created);
        assert_eq!(t.pending_len(), 0);
    }

    #[test]
    fn modified_path_carries_its_mtime() {
        let mut t = tracker();
        let start = Instant::now();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        t.observe_modified(PathBuf::from("/w/a.mkv"), mtime, start);

        let due = t.take_due(start + MODIFY);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, DueCheck::Modified { mtime });
    }

    #[test]
    fn later_event_rearms_the_window() {
        let mut t = tracker();
        let start = Instant::now();
        let mtime_a = SystemTime::UNIX_EPOCH;
        let mtime_b = SystemTime::UNIX_EPOCH + Duration::from_secs(10);

        t.observe_modified(PathBuf::from("/w/a.mkv"), mtime_a, start);
        // Another write lands before the window expires.
        t.observe_modified(PathBuf::from("/w/a.mkv"), mtime_b, start + Duration::from_secs(1));

        // Old due time passes without firing.
        assert!(t.take_due(start + MODIFY).is_empty());

        let due = t.take_due(start + Duration::from_secs(1) + MODIFY);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, DueCheck::Modified { mtime: mtime_b });
    }

    #[test]
    fn modification_supersedes_creation() {
        let mut t = tracker();
        let start = Instant::now();
        t.observe_created(PathBuf::from("/w/a.mkv"), start);
        t.observe_modified(PathBuf::from("/w/a.mkv"), SystemTime::UNIX_EPOCH, start);

        // Only the modification check remains, on the longer window.
        assert!(t.take_due(start + CREATE).is_empty());
        let due = t.take_due(start + MODIFY);
        assert_eq!(due.len(), 1);
        assert!(matches!(due[0].1, DueCheck::Modified { .. }));
    }

    #[test]
    fn multiple_paths_settle_independently() {
        let mut t = tracker();
        let start = Instant::now();
        t.observe_created(PathBuf::from("/w/a.mkv"), start);
        t.observe_created(PathBuf::from("/w/b.mkv"), start + Duration::from_millis(500));

        let due = t.take_due(start + CREATE);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, PathBuf::from("/w/a.mkv"));
        assert_eq!(t.pending_len(), 1);
    }

    #[test]
    fn ignore_rules() {
        let patterns = vec!["sample".to_string()];
        assert!(is_ignored(Path::new("/w/.hidden.mkv"), &patterns));
        assert!(is_ignored(Path::new("/w/movie.mkv.tmp"), &patterns));
        assert!(is_ignored(Path::new("/w/movie.mkv.part"), &patterns));
        assert!(is_ignored(Path::new("/w/movie.sample.mkv"), &patterns));
        assert!(!is_ignored(Path::new("/w/movie.mkv"), &patterns));
        assert!(!is_ignored(Path::new("/w/movie.mkv"), &[]));
    }

    #[test]
    fn empty_patterns_never_match() {
        assert!(!is_ignored(Path::new("/w/movie.mkv"), &[String::new()]));
    }
}
