use super::{ComponentState, RepcoachOrchestrator};
use crate::error::Result;
use crate::session::Phase;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl RepcoachOrchestrator {
    /// Stop whatever is still running and release the camera.
    ///
    /// Returns the process exit code: 0 when everything stopped cleanly.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Ends the signal handler tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        self.stop_interactive().await;

        if self.controller.phase() == Phase::Analyzing {
            self.set_component_state("session", ComponentState::Stopping)
                .await;
            match timeout(STOP_TIMEOUT, self.controller.stop()).await {
                Ok(state) => {
                    info!("Session stopped with {} good reps", state.counters.good);
                    self.set_component_state("session", ComponentState::Stopped)
                        .await;
                }
                Err(_) => {
                    error!("Session stop timeout");
                    self.set_component_state("session", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
            }
        }

        if self.capture.is_acquired() {
            warn!("Capture source still held at shutdown, releasing");
            self.capture.release().await;
        }
        self.set_component_state("capture", ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
