use crate::api::WorkoutRecord;
use crate::exercise::ExerciseKind;
use crate::session::SessionState;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why a running session was interrupted from outside
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    /// Stop key: end the session, keep the result
    UserStop,
    /// Quit key: end the session and leave without saving
    UserQuit,
    Error(String),
}

impl ShutdownReason {
    pub fn is_quit(&self) -> bool {
        matches!(self, ShutdownReason::UserQuit)
    }
}

/// What the user asked for on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub exercise: ExerciseKind,
    pub rep_goal: u32,
    /// Submit the result once the session finishes
    pub save: bool,
}

/// Everything known about a session once it is over
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub record: Option<WorkoutRecord>,
    /// Rep count beat the stored personal best
    pub new_record: bool,
    pub saved: bool,
    pub interrupted_by: Option<ShutdownReason>,
}

impl SessionOutcome {
    pub fn quit_requested(&self) -> bool {
        self.interrupted_by
            .as_ref()
            .map(ShutdownReason::is_quit)
            .unwrap_or(false)
    }
}
