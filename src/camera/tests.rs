use super::*;
use crate::config::{CaptureConfig, CaptureSourceKind};
use crate::error::CaptureError;
use crate::snapshot::SnapshotFormat;
use std::fs;

fn write_frames(dir: &std::path::Path) {
    fs::write(dir.join("frame_002.jpg"), [0xFF, 0xD8, 0x02, 0xFF, 0xD9]).unwrap();
    fs::write(dir.join("frame_001.jpg"), [0xFF, 0xD8, 0x01, 0xFF, 0xD9]).unwrap();
    fs::write(dir.join("frame_003.png"), [0x89, b'P', b'N', b'G']).unwrap();
    fs::write(dir.join("README.txt"), b"not a frame").unwrap();
}

#[tokio::test]
async fn test_directory_source_replays_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path());

    let source = DirectoryCaptureSource::new(dir.path(), false);
    assert!(!source.is_acquired());
    source.acquire().await.unwrap();
    assert!(source.is_acquired());
    assert_eq!(source.frame_count(), 3);

    let first = source.snapshot().await.unwrap().unwrap();
    assert_eq!(first.data[2], 0x01);
    assert_eq!(first.format, SnapshotFormat::Jpeg);
    assert_eq!(first.id, 1);

    let second = source.snapshot().await.unwrap().unwrap();
    assert_eq!(second.data[2], 0x02);

    let third = source.snapshot().await.unwrap().unwrap();
    assert_eq!(third.format, SnapshotFormat::Png);

    // Exhausted, no looping: ticks get nothing
    assert!(source.snapshot().await.unwrap().is_none());
    assert_eq!(source.snapshot_count(), 3);
}

#[tokio::test]
async fn test_directory_source_loops() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path());

    let source = DirectoryCaptureSource::new(dir.path(), true);
    source.acquire().await.unwrap();
    for _ in 0..3 {
        source.snapshot().await.unwrap().unwrap();
    }
    let wrapped = source.snapshot().await.unwrap().unwrap();
    assert_eq!(wrapped.data[2], 0x01);
    assert_eq!(wrapped.id, 4);
}

#[tokio::test]
async fn test_directory_source_without_frames_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectoryCaptureSource::new(dir.path(), true);

    match source.acquire().await {
        Err(CaptureError::Unavailable { details, .. }) => {
            assert!(details.contains("no JPEG or PNG frames"));
        }
        other => panic!("Expected unavailable source, got {:?}", other),
    }
    assert!(!source.is_acquired());

    let missing = DirectoryCaptureSource::new(dir.path().join("missing"), true);
    assert!(matches!(
        missing.acquire().await,
        Err(CaptureError::Unavailable { .. })
    ));
}

#[tokio::test]
async fn test_snapshot_requires_acquire_and_release_closes() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path());
    let source = DirectoryCaptureSource::new(dir.path(), true);

    assert_eq!(source.snapshot().await.unwrap_err(), CaptureError::NotAcquired);

    source.acquire().await.unwrap();
    source.release().await;
    assert!(!source.is_acquired());
    assert_eq!(source.snapshot().await.unwrap_err(), CaptureError::NotAcquired);

    // Releasing twice is harmless
    source.release().await;
}

#[tokio::test]
async fn test_synthetic_source() {
    let source = SyntheticCaptureSource::new();
    assert_eq!(source.snapshot().await.unwrap_err(), CaptureError::NotAcquired);

    source.acquire().await.unwrap();
    let snapshot = source.snapshot().await.unwrap().unwrap();
    assert_eq!(snapshot.data.as_slice(), &[0xFF, 0xD8, 0xFF, 0xD9]);
    assert_eq!(source.snapshot_count(), 1);

    source.release().await;
    assert!(!source.is_acquired());
}

#[test]
fn test_builder_selects_source() {
    let config = CaptureConfig {
        source: CaptureSourceKind::Directory,
        frames_path: "/tmp/frames".to_string(),
        loop_frames: false,
    };
    let source = CaptureSourceBuilder::new().config(config).build().unwrap();
    assert_eq!(source.name(), "directory:/tmp/frames");

    let synthetic = CaptureSourceBuilder::new()
        .config(CaptureConfig {
            source: CaptureSourceKind::Synthetic,
            frames_path: String::new(),
            loop_frames: true,
        })
        .build()
        .unwrap();
    assert_eq!(synthetic.name(), "synthetic");
}

#[test]
fn test_builder_validation() {
    let result = CaptureSourceBuilder::new().build();
    match result {
        Err(crate::error::RepcoachError::System { message }) => {
            assert!(message.contains("Capture configuration must be specified"));
        }
        _ => panic!("Expected system error for missing configuration"),
    }
}
