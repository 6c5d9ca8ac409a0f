use super::display::LiveDisplay;
use super::keyboard_input::KeyboardInputHandler;
use super::types::{ComponentState, ShutdownReason};
use crate::announcer::{speech_from_config, FeedbackAnnouncer, SpeechSynthesizer};
use crate::api::{ApiClient, Credential};
use crate::camera::{CaptureSource, CaptureSourceBuilder};
use crate::config::RepcoachConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::persister::ResultPersister;
use crate::session::{SessionController, SessionSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Wires the session components together from configuration and drives
/// them for the command line front end
pub struct RepcoachOrchestrator {
    pub(super) config: RepcoachConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) api: Arc<ApiClient>,
    pub(super) capture: Arc<dyn CaptureSource>,
    pub(super) controller: Arc<SessionController>,
    pub(super) persister: Arc<ResultPersister>,
    pub(super) credential: Option<Credential>,

    // Interactive front end
    pub(super) display: Option<LiveDisplay>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) command_sender: mpsc::UnboundedSender<ShutdownReason>,
    pub(super) command_receiver: Option<mpsc::UnboundedReceiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl RepcoachOrchestrator {
    /// Build every component named by `config`, speaking through the
    /// configured speech facility
    pub fn new(config: RepcoachConfig, credential: Option<Credential>) -> Result<Self> {
        let speech = speech_from_config(&config.speech);
        Self::with_speech(config, credential, speech)
    }

    pub fn with_speech(
        config: RepcoachConfig,
        credential: Option<Credential>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let api = Arc::new(ApiClient::new(&config.api)?);
        let capture = CaptureSourceBuilder::new()
            .config(config.capture.clone())
            .build()?;
        let announcer = Arc::new(FeedbackAnnouncer::new(speech));

        let controller = Arc::new(
            SessionController::new(
                api.clone(),
                Arc::clone(&capture),
                announcer,
                Arc::clone(&event_bus),
                SessionSettings {
                    exercise: config.session.exercise,
                    rep_goal: config.session.rep_goal,
                },
            )
            .with_tick_interval(config.session.tick_interval()),
        );

        let persister = Arc::new(
            ResultPersister::new(api.clone()).with_event_bus(Arc::clone(&event_bus)),
        );

        // Explicit credential wins over the configured token
        let credential = credential.or_else(|| Credential::from_token(config.api.token.as_deref()));
        if credential.is_none() {
            info!("No bearer token configured; backend calls will be refused locally");
        }

        let (command_sender, command_receiver) = mpsc::unbounded_channel();

        debug!("Orchestrator built for backend {}", api.base_url());

        Ok(Self {
            config,
            event_bus,
            api,
            capture,
            controller,
            persister,
            credential,
            display: None,
            keyboard_handler: None,
            keyboard_enabled: false,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            command_sender,
            command_receiver: Some(command_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable keyboard controls and the live display
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &RepcoachConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn controller(&self) -> Arc<SessionController> {
        Arc::clone(&self.controller)
    }

    pub fn persister(&self) -> Arc<ResultPersister> {
        Arc::clone(&self.persister)
    }

    /// Sender used to stop a running session from outside
    pub fn command_sender(&self) -> mpsc::UnboundedSender<ShutdownReason> {
        self.command_sender.clone()
    }

    pub(super) async fn set_component_state(&self, component: &str, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.component_states
            .lock()
            .await
            .insert(component.to_string(), state);
    }

    pub async fn component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }
}
