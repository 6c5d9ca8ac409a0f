use crate::error::CaptureError;
use crate::snapshot::Snapshot;
use async_trait::async_trait;

/// A live image source a session can take stills from.
///
/// The source is acquired when a session starts and must be released on
/// every path out of the analyzing phase. `snapshot` returning `Ok(None)`
/// means no frame is ready yet; callers skip that tick.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Open the underlying device or stream
    async fn acquire(&self) -> Result<(), CaptureError>;

    /// Take a single still from the acquired source
    async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError>;

    /// Close the device; calling it on a released source is a no-op
    async fn release(&self);

    fn is_acquired(&self) -> bool;
}
