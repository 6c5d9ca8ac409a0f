use super::ShutdownReason;
use crate::error::Result;
use crate::events::{EventBus, SessionEvent};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Map a key press to a session command
pub(crate) fn command_for_key(key: &KeyEvent) -> Option<ShutdownReason> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('s') | KeyCode::Char(' ') => Some(ShutdownReason::UserStop),
        KeyCode::Char('q') | KeyCode::Esc => Some(ShutdownReason::UserQuit),
        // Raw mode swallows SIGINT, so Ctrl-C arrives as a key
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ShutdownReason::Signal("SIGINT".to_string()))
        }
        _ => None,
    }
}

/// Reads single key presses from the terminal while a session runs
pub struct KeyboardInputHandler {
    event_bus: Arc<EventBus>,
    commands: mpsc::UnboundedSender<ShutdownReason>,
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl KeyboardInputHandler {
    pub fn new(event_bus: Arc<EventBus>, commands: mpsc::UnboundedSender<ShutdownReason>) -> Self {
        Self {
            event_bus,
            commands,
            cancellation_token: CancellationToken::new(),
            task: None,
        }
    }

    /// Start listening for keyboard input
    pub fn start(&mut self) -> Result<()> {
        info!("Keyboard controls: [s]/[space] stop session, [q]/[esc] quit");

        let event_bus = Arc::clone(&self.event_bus);
        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        let handle = task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key)) = event::read() else {
                            continue;
                        };
                        let Some(command) = command_for_key(&key) else {
                            debug!("Key pressed: {:?}", key.code);
                            continue;
                        };

                        if command.is_quit() {
                            event_bus.emit(SessionEvent::ShutdownRequested {
                                timestamp: SystemTime::now(),
                                reason: "User requested via keyboard".to_string(),
                            });
                        }
                        if commands.send(command).is_err() {
                            debug!("Command receiver gone, keyboard handler exiting");
                        }
                        // One command ends the session; nothing left to listen for
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        self.task = Some(handle);
        Ok(())
    }

    /// Stop the keyboard input handler and restore the terminal
    pub async fn stop(&mut self) -> Result<()> {
        debug!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task.take() {
            if tokio::time::timeout(Duration::from_millis(500), handle)
                .await
                .is_err()
            {
                warn!("Keyboard handler did not exit in time");
            }
        }

        // The blocking task may not have reached its own cleanup
        let _ = disable_raw_mode();
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
