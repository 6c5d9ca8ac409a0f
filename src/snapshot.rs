use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Image encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotFormat {
    /// JPEG still, the format webcams hand out
    Jpeg,
    /// PNG still
    Png,
}

impl SnapshotFormat {
    /// MIME type used in data URLs
    pub fn mime_type(&self) -> &'static str {
        match self {
            SnapshotFormat::Jpeg => "image/jpeg",
            SnapshotFormat::Png => "image/png",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(SnapshotFormat::Jpeg),
            "png" => Some(SnapshotFormat::Png),
            _ => None,
        }
    }
}

/// A single still image taken from the capture source at tick time
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Monotonic snapshot identifier within one capture source
    pub id: u64,
    /// When the snapshot was taken
    pub timestamp: SystemTime,
    /// Encoded image bytes (shared so ticks can hand it around cheaply)
    pub data: Arc<Vec<u8>>,
    pub format: SnapshotFormat,
}

impl Snapshot {
    pub fn new(id: u64, data: Vec<u8>, format: SnapshotFormat) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data: Arc::new(data),
            format,
        }
    }

    /// Encode as a `data:` URL, the shape the analysis endpoint expects
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            STANDARD.encode(self.data.as_slice())
        )
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
