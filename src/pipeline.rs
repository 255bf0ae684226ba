//! The per-file processing pipeline: classify, resolve, place.
//!
//! Every attempt produces exactly one [`ProcessingResult`]; nothing in here
//! aborts a batch or the monitoring loop. Metadata absence is a degraded
//! result, not a failure.

use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

use pl_core::{MediaKind, ProcessingResult};

use crate::metadata::MetadataResolver;
use crate::place;

/// File extensions treated as video when walking directories.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "wmv", "flv", "webm"];

/// Classify → resolve → place, as one reusable unit.
pub struct Pipeline {
    resolver: MetadataResolver,
}

impl Pipeline {
    pub fn new(resolver: MetadataResolver) -> Self {
        Self { resolver }
    }

    /// Process a single file into `dest_root`.
    ///
    /// `default_kind` is the directory-level kind hint, applied when
    /// classification yields Unknown.
    pub async fn process_file(
        &self,
        source: &Path,
        dest_root: &Path,
        default_kind: Option<MediaKind>,
    ) -> ProcessingResult {
        let Some(file_name) = source.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            return ProcessingResult::failure(source, dest_root, "source has no file name");
        };

        let mut descriptor = pl_classify::classify(&file_name);
        if descriptor.kind == MediaKind::Unknown {
            if let Some(kind) = default_kind {
                descriptor.kind = kind;
            }
        }

        if let Some(record) = self
            .resolver
            .resolve(&descriptor.title, descriptor.kind, descriptor.year.as_deref())
            .await
        {
            descriptor.apply_record(&record);
        }

        place::place(&descriptor, source, dest_root)
    }

    /// Process every video file under `source_dir` into `dest_root`.
    pub async fn process_directory(
        &self,
        source_dir: &Path,
        dest_root: &Path,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::new();
        for entry in WalkDir::new(source_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if !is_video(entry.path()) {
                continue;
            }
            results.push(self.process_file(entry.path(), dest_root, None).await);
        }
        results
    }

    /// Process only source files whose filename does not yet appear anywhere
    /// under `dest_root`.
    pub async fn process_missing(
        &self,
        source_dir: &Path,
        dest_root: &Path,
    ) -> Vec<ProcessingResult> {
        let existing: HashSet<String> = WalkDir::new(dest_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .collect();

        let mut results = Vec::new();
        for entry in WalkDir::new(source_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            if existing.contains(name.as_ref()) {
                continue;
            }
            results.push(self.process_file(entry.path(), dest_root, None).await);
        }
        results
    }
}

/// Whether the path carries one of the recognized video extensions.
pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        // No providers registered: resolution always degrades gracefully.
        Pipeline::new(MetadataResolver::new(true))
    }

    #[test]
    fn video_extension_filter() {
        assert!(is_video(Path::new("/x/a.mkv")));
        assert!(is_video(Path::new("/x/a.MP4")));
        assert!(!is_video(Path::new("/x/a.nfo")));
        assert!(!is_video(Path::new("/x/noext")));
    }

    #[tokio::test]
    async fn processes_tv_file_end_to_end() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let source = src.path().join("绝命毒师.第2季.第3集.HDTV.mp4");
        std::fs::write(&source, b"x").unwrap();

        let result = pipeline().process_file(&source, dst.path(), None).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(
            result.destination.unwrap(),
            dst.path().join("绝命毒师/Season 02/绝命毒师 - Season 02 E03.mp4")
        );
    }

    #[tokio::test]
    async fn default_kind_hint_applies_to_unknown() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let source = src.path().join("某部电影.mkv");
        std::fs::write(&source, b"x").unwrap();

        let result = pipeline()
            .process_file(&source, dst.path(), Some(MediaKind::Movie))
            .await;
        assert!(result.success);
        // Movie layout (title subdirectory), despite no year in the name.
        assert_eq!(
            result.destination.unwrap(),
            dst.path().join("某部电影/某部电影.mkv")
        );
    }

    #[tokio::test]
    async fn batch_processes_only_videos() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("Show.S01E01.mkv"), b"x").unwrap();
        std::fs::write(src.path().join("Show.S01E01.nfo"), b"x").unwrap();
        std::fs::write(src.path().join("notes.txt"), b"x").unwrap();

        let results = pipeline().process_directory(src.path(), dst.path()).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn batch_recurses_into_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let nested = src.path().join("season1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Show.S01E01.mkv"), b"x").unwrap();

        let results = pipeline().process_directory(src.path(), dst.path()).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn missing_only_skips_already_placed_names() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("Show.S01E01.mkv"), b"x").unwrap();
        std::fs::write(src.path().join("Show.S01E02.mkv"), b"x").unwrap();

        // Simulate a prior placement of episode 1's *source* name.
        let placed = dst.path().join("somewhere");
        std::fs::create_dir_all(&placed).unwrap();
        std::fs::write(placed.join("Show.S01E01.mkv"), b"x").unwrap();

        let results = pipeline().process_missing(src.path(), dst.path()).await;
        assert_eq!(results.len(), 1);
        assert!(results[0]
            .source
            .to_string_lossy()
            .contains("Show.S01E02.mkv"));
    }

    #[tokio::test]
    async fn failure_produces_redo_command() {
        let dst = tempfile::tempdir().unwrap();
        let missing = Path::new("/nonexistent/Show.S01E01.mkv");

        let result = pipeline().process_file(missing, dst.path(), None).await;
        assert!(!result.success);
        let redo = result.redo.unwrap();
        assert_eq!(redo.source, missing);
        assert_eq!(redo.dest_root, dst.path());
    }
}
