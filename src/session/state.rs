use crate::api::{AnalysisResult, RepCounters, WorkoutRecord};
use crate::exercise::ExerciseKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::warn;

pub const IDLE_MESSAGE: &str = "Set a rep target and press Start.";
pub const STARTED_MESSAGE: &str = "Analysis started!";
pub const GOAL_REACHED_MESSAGE: &str = "Goal reached! Great work.";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Session ended.";
pub const COMPLETED_MESSAGE: &str = "Session complete.";

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Analyzing,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Analyzing => "analyzing",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Why a session left the analyzing phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FinishReason {
    GoalReached,
    ManualStop,
    ConnectionLost(String),
}

impl FinishReason {
    /// Feedback text shown (and possibly spoken) when the session ends
    pub fn message(&self) -> &'static str {
        match self {
            FinishReason::GoalReached => GOAL_REACHED_MESSAGE,
            FinishReason::ManualStop => COMPLETED_MESSAGE,
            FinishReason::ConnectionLost(_) => CONNECTION_LOST_MESSAGE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FinishReason::GoalReached => "goal reached",
            FinishReason::ManualStop => "manual stop",
            FinishReason::ConnectionLost(_) => "connection lost",
        }
    }
}

/// What the next session will track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub exercise: ExerciseKind,
    pub rep_goal: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            exercise: ExerciseKind::Squat,
            rep_goal: 10,
        }
    }
}

/// State of one workout attempt. A new attempt always gets a new value;
/// a finished state is never reused.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: Option<String>,
    pub phase: Phase,
    pub exercise: ExerciseKind,
    pub rep_goal: u32,
    pub counters: RepCounters,
    /// Last accuracy reported by the backend, 0..=100
    pub accuracy: u8,
    pub feedback: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub finish_reason: Option<FinishReason>,
    started_instant: Option<Instant>,
    final_elapsed: Option<Duration>,
    accuracy_sum: u64,
    accuracy_samples: u32,
}

impl SessionState {
    pub fn idle(settings: SessionSettings) -> Self {
        Self {
            session_id: None,
            phase: Phase::Idle,
            exercise: settings.exercise,
            rep_goal: settings.rep_goal,
            counters: RepCounters::default(),
            accuracy: 0,
            feedback: IDLE_MESSAGE.to_string(),
            started_at: None,
            finished_at: None,
            finish_reason: None,
            started_instant: None,
            final_elapsed: None,
            accuracy_sum: 0,
            accuracy_samples: 0,
        }
    }

    /// Fresh state for a session entering the analyzing phase
    pub(crate) fn begin(settings: SessionSettings, session_id: String) -> Self {
        Self {
            session_id: Some(session_id),
            phase: Phase::Analyzing,
            feedback: STARTED_MESSAGE.to_string(),
            started_at: Some(Utc::now()),
            started_instant: Some(Instant::now()),
            ..Self::idle(settings)
        }
    }

    /// Overwrite counters, accuracy and feedback with a tick's result.
    /// Returns true when the rep goal is met.
    pub(crate) fn apply(&mut self, result: &AnalysisResult) -> bool {
        if result.counters.good < self.counters.good {
            warn!(
                "Backend reported fewer good reps than before ({} -> {})",
                self.counters.good, result.counters.good
            );
        }

        self.counters = result.counters;
        self.accuracy = result.accuracy;
        self.feedback = result.feedback.clone();

        if result.accuracy > 0 {
            self.accuracy_sum += u64::from(result.accuracy);
            self.accuracy_samples += 1;
        }

        self.goal_reached()
    }

    pub(crate) fn finish(&mut self, reason: FinishReason) {
        self.phase = Phase::Finished;
        self.feedback = reason.message().to_string();
        self.finished_at = Some(Utc::now());
        self.final_elapsed = self.started_instant.map(|started| started.elapsed());
        self.finish_reason = Some(reason);
    }

    pub fn goal_reached(&self) -> bool {
        self.counters.good >= self.rep_goal
    }

    /// Time spent analyzing; frozen once the session finishes
    pub fn elapsed(&self) -> Duration {
        match (self.final_elapsed, self.started_instant) {
            (Some(elapsed), _) => elapsed,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Elapsed time rounded to whole seconds
    pub fn duration_seconds(&self) -> u64 {
        (self.elapsed().as_millis() as u64 + 500) / 1000
    }

    /// Mean of the non-zero accuracy samples, rounded
    pub fn average_accuracy(&self) -> u8 {
        if self.accuracy_samples == 0 {
            return 0;
        }
        let samples = u64::from(self.accuracy_samples);
        ((self.accuracy_sum + samples / 2) / samples).min(100) as u8
    }

    /// The record to persist, available once the session has finished
    pub fn record(&self) -> Option<WorkoutRecord> {
        if self.phase != Phase::Finished {
            return None;
        }
        Some(WorkoutRecord {
            exercise: self.exercise,
            rep_count: self.counters.good,
            duration_seconds: self.duration_seconds(),
            average_accuracy: self.average_accuracy(),
        })
    }
}
