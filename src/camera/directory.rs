use super::source::CaptureSource;
use crate::error::CaptureError;
use crate::snapshot::{Snapshot, SnapshotFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct ReplayState {
    frames: Vec<(PathBuf, SnapshotFormat)>,
    cursor: usize,
    acquired: bool,
}

/// Replays still frames from a directory in file-name order.
///
/// Useful for running a session against a recorded workout instead of a
/// live webcam.
pub struct DirectoryCaptureSource {
    name: String,
    path: PathBuf,
    loop_frames: bool,
    state: Mutex<ReplayState>,
    snapshot_counter: AtomicU64,
}

impl DirectoryCaptureSource {
    pub fn new<P: AsRef<Path>>(path: P, loop_frames: bool) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("directory:{}", path.display()),
            path,
            loop_frames,
            state: Mutex::new(ReplayState::default()),
            snapshot_counter: AtomicU64::new(0),
        }
    }

    /// Number of frames found on acquire
    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Snapshots handed out so far
    pub fn snapshot_count(&self) -> u64 {
        self.snapshot_counter.load(Ordering::Relaxed)
    }

    fn unavailable(&self, details: String) -> CaptureError {
        CaptureError::Unavailable {
            source_name: self.name.clone(),
            details,
        }
    }

    async fn scan_frames(&self) -> Result<Vec<(PathBuf, SnapshotFormat)>, CaptureError> {
        let mut entries = fs::read_dir(&self.path)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let mut frames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?
        {
            let path = entry.path();
            match SnapshotFormat::from_path(&path) {
                Some(format) => frames.push((path, format)),
                None => trace!("Skipping non-image file {}", path.display()),
            }
        }

        frames.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(frames)
    }
}

#[async_trait]
impl CaptureSource for DirectoryCaptureSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self) -> Result<(), CaptureError> {
        let frames = self.scan_frames().await?;
        if frames.is_empty() {
            return Err(self.unavailable("no JPEG or PNG frames found".to_string()));
        }

        info!("Replaying {} frames from {}", frames.len(), self.path.display());

        let mut state = self.state.lock();
        state.frames = frames;
        state.cursor = 0;
        state.acquired = true;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError> {
        let next = {
            let mut state = self.state.lock();
            if !state.acquired {
                return Err(CaptureError::NotAcquired);
            }
            if state.cursor >= state.frames.len() {
                if !self.loop_frames {
                    return Ok(None);
                }
                debug!("Frame directory exhausted, looping");
                state.cursor = 0;
            }
            let frame = state.frames[state.cursor].clone();
            state.cursor += 1;
            frame
        };

        let (path, format) = next;
        let data = fs::read(&path)
            .await
            .map_err(|e| CaptureError::SnapshotRead {
                path: path.display().to_string(),
                details: e.to_string(),
            })?;

        if data.is_empty() {
            warn!("Frame {} is empty, skipping", path.display());
            return Ok(None);
        }

        let id = self.snapshot_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Some(Snapshot::new(id, data, format)))
    }

    async fn release(&self) {
        let mut state = self.state.lock();
        if state.acquired {
            debug!("Releasing {}", self.name);
        }
        state.acquired = false;
        state.frames.clear();
        state.cursor = 0;
    }

    fn is_acquired(&self) -> bool {
        self.state.lock().acquired
    }
}
