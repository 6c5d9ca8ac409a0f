use super::directory::DirectoryCaptureSource;
use super::source::CaptureSource;
use super::synthetic::SyntheticCaptureSource;
use crate::config::{CaptureConfig, CaptureSourceKind};
use crate::error::{RepcoachError, Result};
use std::sync::Arc;
use tracing::info;

/// Builder that opens the capture source named by the configuration
pub struct CaptureSourceBuilder {
    config: Option<CaptureConfig>,
}

impl CaptureSourceBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Arc<dyn CaptureSource>> {
        let config = self
            .config
            .ok_or_else(|| RepcoachError::system("Capture configuration must be specified"))?;

        let source: Arc<dyn CaptureSource> = match config.source {
            CaptureSourceKind::Directory => Arc::new(DirectoryCaptureSource::new(
                &config.frames_path,
                config.loop_frames,
            )),
            CaptureSourceKind::Synthetic => Arc::new(SyntheticCaptureSource::new()),
        };

        info!("Using capture source {}", source.name());
        Ok(source)
    }
}

impl Default for CaptureSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
