use super::display::LiveDisplay;
use super::keyboard_input::KeyboardInputHandler;
use super::types::{ComponentState, SessionOptions, SessionOutcome, ShutdownReason};
use super::RepcoachOrchestrator;
use crate::api::{PersonalBests, WorkoutRecord, WorkoutStore};
use crate::error::{RepcoachError, Result};
use crate::session::SessionState;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

impl RepcoachOrchestrator {
    /// Run one session to completion.
    ///
    /// Returns once the goal is reached, the backend is lost, or the user
    /// (keyboard or signal) stops it. With `options.save` the finished
    /// result is submitted, whatever its rep count; a failed save is
    /// reported and the result stays staged for [`retry_save`].
    ///
    /// [`retry_save`]: RepcoachOrchestrator::retry_save
    pub async fn run_session(&mut self, options: SessionOptions) -> Result<SessionOutcome> {
        let mut commands = self
            .command_receiver
            .take()
            .ok_or_else(|| RepcoachError::system("Session already run by this orchestrator"))?;

        self.controller.set_exercise(options.exercise)?;
        self.controller.set_rep_goal(options.rep_goal)?;

        let bests = self.load_personal_bests().await;

        self.setup_signal_handlers();
        if self.keyboard_enabled {
            self.start_interactive()?;
        }

        self.set_component_state("session", ComponentState::Starting)
            .await;
        if let Err(e) = self.controller.start(self.credential.clone()).await {
            error!("Failed to start session: {}", e);
            self.set_component_state("session", ComponentState::Failed)
                .await;
            self.stop_interactive().await;
            return Err(e.into());
        }
        self.set_component_state("capture", ComponentState::Running)
            .await;
        self.set_component_state("session", ComponentState::Running)
            .await;

        let (state, interrupted_by) = self.wait_for_end(&mut commands).await;

        self.set_component_state("capture", ComponentState::Stopped)
            .await;
        self.set_component_state("session", ComponentState::Stopped)
            .await;
        self.stop_interactive().await;

        let record = state.record();
        let new_record = record
            .as_ref()
            .map(|r| r.rep_count > 0 && bests.is_new_record(r.exercise, r.rep_count))
            .unwrap_or(false);
        if new_record {
            info!("New personal best for {}", state.exercise.label());
        }

        let mut outcome = SessionOutcome {
            state,
            record,
            new_record,
            saved: false,
            interrupted_by,
        };

        if options.save && !outcome.quit_requested() {
            outcome.saved = self.save_outcome(&outcome).await;
        }

        Ok(outcome)
    }

    /// Wait for the session to end on its own or for an outside command
    async fn wait_for_end(
        &self,
        commands: &mut mpsc::UnboundedReceiver<ShutdownReason>,
    ) -> (SessionState, Option<ShutdownReason>) {
        tokio::select! {
            state = self.controller.wait_finished() => (state, None),
            command = commands.recv() => {
                let reason = command.unwrap_or_else(|| {
                    ShutdownReason::Error("command channel closed".to_string())
                });
                info!("Stopping session: {:?}", reason);
                let state = self.controller.stop().await;
                (state, Some(reason))
            }
        }
    }

    async fn load_personal_bests(&self) -> PersonalBests {
        let Some(credential) = &self.credential else {
            return PersonalBests::default();
        };
        match self.api.personal_bests(credential).await {
            Ok(bests) => bests,
            Err(e) => {
                warn!("Could not load personal bests: {}", e);
                PersonalBests::default()
            }
        }
    }

    async fn save_outcome(&self, outcome: &SessionOutcome) -> bool {
        let Some(record) = outcome.record.clone() else {
            return false;
        };

        self.persister.stage(record).await;
        match self.persister.save(self.credential.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to save workout, it is kept for retry: {}", e);
                false
            }
        }
    }

    /// Submit the result held from the last session again.
    ///
    /// Only meaningful after a failed save; the workout itself is not rerun.
    pub async fn retry_save(&self) -> Result<WorkoutRecord> {
        let record = self.persister.save(self.credential.as_ref()).await?;
        Ok(record)
    }

    /// A finished result is still waiting to be stored
    pub async fn has_unsaved_result(&self) -> bool {
        self.persister.pending().await.is_some() && !self.persister.is_saved().await
    }

    fn start_interactive(&mut self) -> Result<()> {
        let mut display = LiveDisplay::new(self.event_bus());
        display.start();
        self.display = Some(display);

        let mut keyboard = KeyboardInputHandler::new(self.event_bus(), self.command_sender());
        keyboard.start()?;
        self.keyboard_handler = Some(keyboard);
        Ok(())
    }

    pub(super) async fn stop_interactive(&mut self) {
        if let Some(mut keyboard) = self.keyboard_handler.take() {
            if let Err(e) = keyboard.stop().await {
                error!("Error stopping keyboard: {}", e);
            }
        }
        if let Some(mut display) = self.display.take() {
            display.stop().await;
        }
    }

    /// Turn SIGINT/SIGTERM into a graceful session stop
    fn setup_signal_handlers(&self) {
        let cancellation_token = self.cancellation_token.clone();

        #[cfg(unix)]
        {
            let sender = self.command_sender();
            let token = cancellation_token.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let sender = self.command_sender();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancellation_token.cancelled() => {}
                result = signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Received SIGINT signal (Ctrl+C)");
                        let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                }
            }
        });
    }
}
