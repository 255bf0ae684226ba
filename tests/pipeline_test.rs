//! End-to-end pipeline tests over real temp directories: classification,
//! placement layout, idempotency, and the redo round trip.

use std::path::Path;

use plexlink::metadata::MetadataResolver;
use plexlink::pipeline::Pipeline;
use plexlink::redo::RedoLog;

fn offline_pipeline() -> Pipeline {
    // No providers: metadata resolution degrades to the raw descriptor.
    Pipeline::new(MetadataResolver::new(true))
}

// ---------------------------------------------------------------------------
// Placement layout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tv_episode_lands_in_season_folder() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let source = src.path().join("Breaking.Bad.S01E02.720p.mkv");
    std::fs::write(&source, b"x").unwrap();

    let result = offline_pipeline()
        .process_file(&source, dst.path(), None)
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(
        result.destination.unwrap(),
        dst.path()
            .join("Breaking Bad/Season 01/Breaking Bad - Season 01 E02.mkv")
    );
}

#[tokio::test]
async fn cjk_episode_lands_in_season_folder() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let source = src.path().join("绝命毒师.第2季.第3集.HDTV.mp4");
    std::fs::write(&source, b"x").unwrap();

    let result = offline_pipeline()
        .process_file(&source, dst.path(), None)
        .await;
    assert!(result.success);
    assert_eq!(
        result.destination.unwrap(),
        dst.path()
            .join("绝命毒师/Season 02/绝命毒师 - Season 02 E03.mp4")
    );
}

#[tokio::test]
async fn movie_lands_in_title_folder() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let source = src.path().join("盗梦空间.2010.1080p.BluRay.x264.mp4");
    std::fs::write(&source, b"x").unwrap();

    let result = offline_pipeline()
        .process_file(&source, dst.path(), None)
        .await;
    assert!(result.success);
    assert_eq!(
        result.destination.unwrap(),
        dst.path().join("盗梦空间/盗梦空间 (2010).mp4")
    );
}

#[tokio::test]
async fn episode_range_keeps_range_suffix() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let source = src.path().join("生活大爆炸.E10-E12.1080p.mp4");
    std::fs::write(&source, b"x").unwrap();

    let result = offline_pipeline()
        .process_file(&source, dst.path(), None)
        .await;
    assert!(result.success);
    assert_eq!(
        result.destination.unwrap(),
        dst.path()
            .join("生活大爆炸/Season 01/生活大爆炸 - Season 01 E10-E12.mp4")
    );
}

#[tokio::test]
async fn unknown_file_lands_directly_under_root() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let source = src.path().join("concert_recording.webm");
    std::fs::write(&source, b"x").unwrap();

    let result = offline_pipeline()
        .process_file(&source, dst.path(), None)
        .await;
    assert!(result.success);
    assert_eq!(
        result.destination.unwrap(),
        dst.path().join("concert recording.webm")
    );
}

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_processing_is_idempotent() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let source = src.path().join("Show.S01E01.mkv");
    std::fs::write(&source, b"x").unwrap();

    let pipeline = offline_pipeline();
    let first = pipeline.process_file(&source, dst.path(), None).await;
    let second = pipeline.process_file(&source, dst.path(), None).await;

    assert!(first.success);
    assert!(second.success);
    assert_eq!(first.destination, second.destination);

    let season_dir = dst.path().join("Show/Season 01");
    assert_eq!(std::fs::read_dir(season_dir).unwrap().count(), 1);
}

// ---------------------------------------------------------------------------
// Redo round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replayed_command_reproduces_the_destination() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let redo_dir = tempfile::tempdir().unwrap();

    let pipeline = offline_pipeline();
    let log = RedoLog::open(redo_dir.path(), 100).unwrap();

    // First attempt fails: source not yet present.
    let source = src.path().join("Show.S03E07.mkv");
    let failed = pipeline.process_file(&source, dst.path(), None).await;
    assert!(!failed.success);
    let entry = log.record(&failed).unwrap();

    // What the direct pipeline would compute once the file exists.
    std::fs::write(&source, b"x").unwrap();
    let expected = plexlink::place::destination_path(
        &pl_classify::classify("Show.S03E07.mkv"),
        &source,
        dst.path(),
    );

    let replayed = log.replay(entry.id, &pipeline).await.unwrap();
    assert!(replayed.success);
    assert_eq!(replayed.destination.as_deref(), Some(expected.as_path()));
    assert!(log.get(entry.id).unwrap().processed);
}

#[tokio::test]
async fn redo_command_text_parses_back_to_the_same_inputs() {
    let dst = tempfile::tempdir().unwrap();
    let pipeline = offline_pipeline();

    let failed = pipeline
        .process_file(Path::new("/nonexistent/Show.S01E01.mkv"), dst.path(), None)
        .await;
    let command = failed.redo.unwrap();

    let reparsed: pl_core::RedoCommand = command.to_string().parse().unwrap();
    assert_eq!(reparsed, command);
}

// ---------------------------------------------------------------------------
// Isolation: one failure never aborts a batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_continues_past_failures() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    std::fs::write(src.path().join("Good.S01E01.mkv"), b"x").unwrap();
    std::fs::write(src.path().join("Doomed.S01E02.mkv"), b"x").unwrap();

    // Sabotage one destination: its title directory already exists as a
    // plain file, so the directory tree cannot be created.
    std::fs::write(dst.path().join("Doomed"), b"not a directory").unwrap();

    let results = offline_pipeline()
        .process_directory(src.path(), dst.path())
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().any(|r| r.success));

    let failures: Vec<_> = results.iter().filter(|r| !r.success).collect();
    assert_eq!(failures.len(), 1);
    // Every failure carries a replayable command.
    assert!(failures.iter().all(|r| r.redo.is_some()));
}
