//! pl-core: shared types, errors, and the event system.
//!
//! This crate is the foundational dependency for the rest of the plexlink
//! workspace, providing the unified error type, the media data model
//! (descriptors, provider records, processing results, redo entries), and
//! a broadcast event bus.

pub mod error;
pub mod events;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
