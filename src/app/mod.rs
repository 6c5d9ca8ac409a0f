pub mod keyboard_input;

mod display;
mod orchestrator;
mod reports;
mod runtime;
mod shutdown;
mod types;


pub use display::LiveDisplay;
pub use orchestrator::RepcoachOrchestrator;
pub use reports::{BestsReport, HistoryReport};
pub use types::{ComponentState, SessionOptions, SessionOutcome, ShutdownReason};
