mod analysis;
mod client;
mod workouts;
#[cfg(test)]
mod tests;

pub use analysis::{AnalysisBackend, AnalysisResult, RepCounters};
pub use client::{ApiClient, Credential};
pub use workouts::{PersonalBests, WorkoutHistoryEntry, WorkoutRecord, WorkoutStore};

#[cfg(test)]
pub(crate) use analysis::clamp_accuracy;
