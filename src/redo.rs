//! Durable redo log for failed placements.
//!
//! Every failed placement becomes a `redo_<id>.json` file plus an in-memory
//! index entry. The log holds at most `max_entries` entries; the oldest are
//! evicted (file deleted) as new failures arrive. Entries reload from disk
//! on startup, so outstanding work survives restarts.
//!
//! The index lock is never held across an await: `replay` snapshots the
//! command, runs the pipeline, then re-locks to flip `processed`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use pl_core::{Error, ProcessingResult, RedoEntry, Result};

use crate::pipeline::Pipeline;

struct RedoState {
    entries: Vec<RedoEntry>,
    last_id: i64,
}

/// Append-mostly durable record of failed placements.
pub struct RedoLog {
    dir: PathBuf,
    max_entries: usize,
    state: Mutex<RedoState>,
}

impl RedoLog {
    /// Open (or create) a redo log rooted at `dir`, loading existing
    /// entries. Corrupt entry files are skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if !is_redo_file(&path) {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<RedoEntry>(&contents) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Skipping corrupt redo file {}: {e}", path.display()),
                },
                Err(e) => warn!("Failed to read redo file {}: {e}", path.display()),
            }
        }
        entries.sort_by_key(|e| e.id);

        let last_id = entries.last().map_or(0, |e| e.id);
        let log = Self {
            dir,
            max_entries,
            state: Mutex::new(RedoState { entries, last_id }),
        };
        log.evict_over_cap();
        Ok(log)
    }

    /// Record a failed result. Results without a redo command (successes,
    /// skips) are ignored and return `None`.
    pub fn record(&self, result: &ProcessingResult) -> Option<RedoEntry> {
        let command = result.redo.clone()?;

        let entry = {
            let mut state = self.state.lock();
            // Millisecond timestamps order entries; bump past the last id
            // when two failures land in the same millisecond.
            let id = Utc::now().timestamp_millis().max(state.last_id + 1);
            state.last_id = id;
            let entry = RedoEntry::new(id, command, result.clone());
            state.entries.push(entry.clone());
            entry
        };

        self.persist(&entry);
        self.evict_over_cap();
        debug!(id = entry.id, "redo entry recorded");
        Some(entry)
    }

    /// All entries not yet successfully replayed, oldest first.
    pub fn list_pending(&self) -> Vec<RedoEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| !e.processed)
            .cloned()
            .collect()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: i64) -> Option<RedoEntry> {
        self.state.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    /// Mark an entry as processed and persist the change.
    pub fn mark_processed(&self, id: i64) -> Result<()> {
        let entry = {
            let mut state = self.state.lock();
            let entry = state
                .entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| Error::not_found("redo entry", id))?;
            entry.processed = true;
            entry.clone()
        };
        self.persist_strict(&entry)
    }

    /// Re-run the full pipeline for a pending entry. On success the entry is
    /// marked processed.
    pub async fn replay(&self, id: i64, pipeline: &Pipeline) -> Result<ProcessingResult> {
        let entry = self
            .get(id)
            .filter(|e| !e.processed)
            .ok_or_else(|| Error::not_found("pending redo entry", id))?;

        let result = pipeline
            .process_file(&entry.command.source, &entry.command.dest_root, None)
            .await;

        if result.success {
            self.mark_processed(id)?;
        }
        Ok(result)
    }

    fn entry_path(&self, id: i64) -> PathBuf {
        self.dir.join(format!("redo_{id}.json"))
    }

    /// Best-effort persistence; the in-memory entry survives either way.
    fn persist(&self, entry: &RedoEntry) {
        if let Err(e) = self.persist_strict(entry) {
            warn!(id = entry.id, "Failed to persist redo entry: {e}");
        }
    }

    fn persist_strict(&self, entry: &RedoEntry) -> Result<()> {
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| Error::Internal(format!("redo entry serialization failed: {e}")))?;
        std::fs::write(self.entry_path(entry.id), json)?;
        Ok(())
    }

    fn evict_over_cap(&self) {
        let evicted: Vec<RedoEntry> = {
            let mut state = self.state.lock();
            let excess = state.entries.len().saturating_sub(self.max_entries);
            state.entries.drain(..excess).collect()
        };
        for entry in evicted {
            debug!(id = entry.id, "evicting redo entry beyond cap");
            if let Err(e) = std::fs::remove_file(self.entry_path(entry.id)) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(id = entry.id, "Failed to remove evicted redo file: {e}");
                }
            }
        }
    }
}

fn is_redo_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("redo_") && n.ends_with(".json"))
}
