//! Placement: destination-path computation and hardlink creation.
//!
//! Destination layout:
//! - TV: `dest_root/title/Season NN/<formatted name>`
//! - Movie: `dest_root/title/<formatted name>`
//! - Unknown: `dest_root/<cleaned title>.<ext>`
//!
//! Placement overwrites an existing destination file (no merging, no
//! versioning). Two distinct sources resolving to the same computed name
//! therefore overwrite each other — a documented limitation of the layout,
//! not something this module papers over.

use std::path::{Path, PathBuf};

use pl_classify::{format_name, season_dir_name};
use pl_core::{MediaDescriptor, MediaKind, ProcessingResult};

/// Compute the canonical destination path for a descriptor.
pub fn destination_path(desc: &MediaDescriptor, source: &Path, dest_root: &Path) -> PathBuf {
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let file_name = format_name(desc, extension);

    match (desc.kind, desc.season) {
        (MediaKind::Tv, Some(season)) => dest_root
            .join(&desc.title)
            .join(season_dir_name(season))
            .join(file_name),
        (MediaKind::Movie, _) => dest_root.join(&desc.title).join(file_name),
        _ => dest_root.join(file_name),
    }
}

/// Place `source` at its computed destination under `dest_root` via
/// hardlink. Never panics; every failure is captured in the result.
pub fn place(desc: &MediaDescriptor, source: &Path, dest_root: &Path) -> ProcessingResult {
    let dest = destination_path(desc, source, dest_root);

    match create_hardlink(source, &dest) {
        Ok(()) => {
            tracing::info!(
                source = %source.display(),
                dest = %dest.display(),
                "hardlink created"
            );
            let message = format!(
                "processed {} -> {}",
                source.file_name().unwrap_or_default().to_string_lossy(),
                dest.file_name().unwrap_or_default().to_string_lossy()
            );
            ProcessingResult::success(source, dest, message)
        }
        Err(e) => {
            tracing::error!(
                source = %source.display(),
                dest = %dest.display(),
                error = %e,
                "hardlink failed"
            );
            ProcessingResult::failure(source, dest_root, format!("hardlink failed: {e}"))
        }
    }
}

/// Idempotent hardlink: ensure the parent tree exists, remove any existing
/// destination file, link.
fn create_hardlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if dest.exists() {
        std::fs::remove_file(dest)?;
    }
    std::fs::hard_link(source, dest)
}
