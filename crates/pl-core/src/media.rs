//! Core media data model.
//!
//! These are the typed shapes that flow through the whole pipeline:
//! a [`MediaDescriptor`] comes out of classification, may be enriched from a
//! [`ProviderRecord`], and every placement attempt produces exactly one
//! [`ProcessingResult`]. Failed placements carry a [`RedoCommand`] which the
//! redo log persists inside a [`RedoEntry`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Broad classification of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Episodic content (has season/episode numbering).
    Tv,
    /// Feature film (identified by a release year).
    Movie,
    /// Nothing recognizable in the filename.
    Unknown,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Tv => write!(f, "tv"),
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// MediaDescriptor
// ---------------------------------------------------------------------------

/// Structured classification of a media filename.
///
/// `season`/`episode` are populated only when `kind` is [`MediaKind::Tv`].
/// `year` is meaningful for movies but is captured opportunistically for TV
/// when the filename carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub end_episode: Option<u32>,
    pub year: Option<String>,
}

impl MediaDescriptor {
    /// Create a descriptor with only the title populated.
    pub fn unknown(title: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Unknown,
            title: title.into(),
            season: None,
            episode: None,
            end_episode: None,
            year: None,
        }
    }

    /// Merge canonical metadata into this descriptor.
    ///
    /// The provider's title and year overwrite the filename-derived ones;
    /// episode numbering always comes from the filename.
    pub fn apply_record(&mut self, record: &ProviderRecord) {
        if !record.title.is_empty() {
            self.title = record.title.clone();
        }
        if record.year.is_some() {
            self.year = record.year.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderRecord
// ---------------------------------------------------------------------------

/// Canonical metadata returned by a provider adapter.
///
/// Every provider normalizes its own response schema into this shape before
/// it reaches the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<String>,
    pub kind: MediaKind,
    /// Provider-specific identifier (e.g. TMDB numeric ID as a string).
    pub external_id: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    /// Name of the adapter that produced this record (e.g. "tmdb").
    pub provider: String,
}

// ---------------------------------------------------------------------------
// RedoCommand
// ---------------------------------------------------------------------------

/// Replayable placement command.
///
/// This is the single canonical command shape for retrying a failed
/// placement: the durable form is the structured value itself; the textual
/// rendering is `"/redo <source> <dest_root>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedoCommand {
    pub source: PathBuf,
    pub dest_root: PathBuf,
}

impl RedoCommand {
    pub fn new(source: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest_root: dest_root.into(),
        }
    }
}

impl fmt::Display for RedoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/redo {} {}",
            self.source.display(),
            self.dest_root.display()
        )
    }
}

impl FromStr for RedoCommand {
    type Err = Error;

    /// Parse the canonical textual form.
    ///
    /// The first whitespace-delimited token after `/redo` is the source path,
    /// the remainder the destination root (which may therefore contain
    /// spaces; the source may not).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix("/redo")
            .ok_or_else(|| Error::Validation(format!("not a redo command: {s}")))?
            .trim_start();

        let (source, dest) = rest
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::Validation(format!("redo command missing destination: {s}")))?;

        let dest = dest.trim();
        if source.is_empty() || dest.is_empty() {
            return Err(Error::Validation(format!("malformed redo command: {s}")));
        }

        Ok(RedoCommand::new(source, dest))
    }
}

// ---------------------------------------------------------------------------
// ProcessingResult
// ---------------------------------------------------------------------------

/// Outcome of one file-processing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub message: String,
    /// Present only on failure; replaying it re-runs the full pipeline.
    pub redo: Option<RedoCommand>,
}

impl ProcessingResult {
    /// Successful placement at `destination`.
    pub fn success(source: &Path, destination: PathBuf, message: impl Into<String>) -> Self {
        Self {
            success: true,
            source: source.to_path_buf(),
            destination: Some(destination),
            message: message.into(),
            redo: None,
        }
    }

    /// Failed attempt, carrying a replayable command for the same inputs.
    pub fn failure(source: &Path, dest_root: &Path, message: impl Into<String>) -> Self {
        Self {
            success: false,
            source: source.to_path_buf(),
            destination: None,
            message: message.into(),
            redo: Some(RedoCommand::new(source, dest_root)),
        }
    }

    /// Failed attempt with no meaningful redo target (e.g. the destination
    /// root itself could not be determined).
    pub fn skipped(source: &Path, message: impl Into<String>) -> Self {
        Self {
            success: false,
            source: source.to_path_buf(),
            destination: None,
            message: message.into(),
            redo: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RedoEntry
// ---------------------------------------------------------------------------

/// Durable record of a failed placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedoEntry {
    /// Monotonically increasing, millisecond-derived identifier.
    pub id: i64,
    pub command: RedoCommand,
    pub timestamp: DateTime<Utc>,
    /// The result that produced this entry.
    pub context: ProcessingResult,
    pub processed: bool,
}

impl RedoEntry {
    pub fn new(id: i64, command: RedoCommand, context: ProcessingResult) -> Self {
        Self {
            id,
            command,
            timestamp: Utc::now(),
            context,
            processed: false,
        }
    }
}
