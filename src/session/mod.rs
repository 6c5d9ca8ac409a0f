mod controller;
mod state;

pub use controller::{SessionController, DEFAULT_TICK_INTERVAL};
pub use state::{
    FinishReason, Phase, SessionSettings, SessionState, COMPLETED_MESSAGE,
    CONNECTION_LOST_MESSAGE, GOAL_REACHED_MESSAGE, IDLE_MESSAGE, STARTED_MESSAGE,
};
