//! pl-classify: filename classifier for media files.
//!
//! Turns a raw filename into a structured [`MediaDescriptor`] (TV episode,
//! movie, or unknown) and formats descriptors back into Plex-shaped names.
//! Classification is a pure, total function: every input yields a
//! descriptor, with [`MediaKind::Unknown`] as the catch-all.
//!
//! # Quick start
//!
//! ```
//! use pl_classify::classify;
//! use pl_core::MediaKind;
//!
//! let d = classify("Breaking.Bad.S01E02.720p.WEB-DL.mkv");
//! assert_eq!(d.kind, MediaKind::Tv);
//! assert_eq!(d.title, "Breaking Bad");
//! assert_eq!(d.season, Some(1));
//! assert_eq!(d.episode, Some(2));
//! ```

mod classify;
mod format;

pub use classify::classify;
pub use format::{format_name, season_dir_name};

pub use pl_core::{MediaDescriptor, MediaKind};
