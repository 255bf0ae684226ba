//! Unified error type for the plexlink application.
//!
//! All crates funnel their failures into [`Error`]. Per-file processing
//! failures are *not* errors: they are captured as failed
//! [`crate::media::ProcessingResult`]s so the monitoring loop keeps running.

use std::fmt;

/// Unified error type covering all failure modes in plexlink.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "redo entry").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation (config files, command strings).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file watcher could not be started or maintained.
    #[error("Watch error: {0}")]
    Watch(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Watch`].
    pub fn watch(message: impl Into<String>) -> Self {
        Error::Watch(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("redo entry", 1755001234567i64);
        assert_eq!(err.to_string(), "redo entry not found: 1755001234567");
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("source_dir is required".into());
        assert_eq!(err.to_string(), "Validation error: source_dir is required");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn watch_display() {
        let err = Error::watch("no valid directories to watch");
        assert_eq!(err.to_string(), "Watch error: no valid directories to watch");
    }

    #[test]
    fn internal_display() {
        let err = Error::Internal("unexpected state".into());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);
    }
}
