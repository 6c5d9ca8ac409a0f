pub mod announcer;
pub mod api;
pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod exercise;
pub mod persister;
pub mod progress;
pub mod session;
pub mod snapshot;

pub use announcer::{FeedbackAnnouncer, SpeechSynthesizer};
pub use api::{
    AnalysisBackend, AnalysisResult, ApiClient, Credential, PersonalBests, RepCounters,
    WorkoutHistoryEntry, WorkoutRecord, WorkoutStore,
};
pub use app::{RepcoachOrchestrator, SessionOptions, SessionOutcome, ShutdownReason};
pub use camera::{CaptureSource, CaptureSourceBuilder};
pub use config::RepcoachConfig;
pub use error::{RepcoachError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, SessionEvent};
pub use exercise::ExerciseKind;
pub use persister::ResultPersister;
pub use progress::{ProgressPoint, ProgressSeries, ProgressSummary};
pub use session::{FinishReason, Phase, SessionController, SessionSettings, SessionState};
pub use snapshot::{Snapshot, SnapshotFormat};
