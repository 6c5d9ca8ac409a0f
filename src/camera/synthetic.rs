use super::source::CaptureSource;
use crate::error::CaptureError;
use crate::snapshot::{Snapshot, SnapshotFormat};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Smallest well-formed JPEG marker pair (SOI + EOI)
const PLACEHOLDER_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// Capture source without hardware that hands out placeholder JPEG stills
pub struct SyntheticCaptureSource {
    acquired: AtomicBool,
    snapshot_counter: AtomicU64,
}

impl SyntheticCaptureSource {
    pub fn new() -> Self {
        Self {
            acquired: AtomicBool::new(false),
            snapshot_counter: AtomicU64::new(0),
        }
    }

    pub fn snapshot_count(&self) -> u64 {
        self.snapshot_counter.load(Ordering::Relaxed)
    }
}

impl Default for SyntheticCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureSource for SyntheticCaptureSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn acquire(&self) -> Result<(), CaptureError> {
        debug!("Synthetic capture source acquired");
        self.acquired.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError> {
        if !self.acquired.load(Ordering::SeqCst) {
            return Err(CaptureError::NotAcquired);
        }
        let id = self.snapshot_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Some(Snapshot::new(
            id,
            PLACEHOLDER_JPEG.to_vec(),
            SnapshotFormat::Jpeg,
        )))
    }

    async fn release(&self) {
        self.acquired.store(false, Ordering::SeqCst);
    }

    fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }
}
