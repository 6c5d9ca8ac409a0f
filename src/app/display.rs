use crate::events::{EventBus, EventFilter, EventReceiver, SessionEvent};
use std::io::Write;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DISPLAYED_EVENTS: &[&str] = &[
    "session_started",
    "tick_analyzed",
    "goal_reached",
    "connection_lost",
    "session_finished",
    "workout_saved",
];

/// One console line for an event, or nothing for events not shown
pub(crate) fn render_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::SessionStarted {
            exercise, rep_goal, ..
        } => format!("▶ {} - goal {} reps", exercise.label(), rep_goal),
        SessionEvent::TickAnalyzed {
            good,
            bad,
            uncertain,
            accuracy,
            feedback,
        } => {
            let mut line = format!(
                "  good {:>3} | bad {:>3} | uncertain {:>3} | accuracy {:>3}%",
                good, bad, uncertain, accuracy
            );
            if !feedback.trim().is_empty() {
                line.push_str(" | ");
                line.push_str(feedback.trim());
            }
            line
        }
        SessionEvent::GoalReached { good, rep_goal } => {
            format!("✓ Goal reached: {}/{} reps", good, rep_goal)
        }
        SessionEvent::ConnectionLost { error } => format!("✗ Connection lost: {}", error),
        SessionEvent::SessionFinished {
            reason,
            good,
            duration_seconds,
            ..
        } => format!(
            "■ Session finished ({}): {} reps in {}s",
            reason, good, duration_seconds
        ),
        SessionEvent::WorkoutSaved {
            exercise,
            rep_count,
        } => format!("✓ Saved {} x{}", exercise.label(), rep_count),
        _ => return None,
    };
    Some(line)
}

/// Prints session progress to the terminal as events arrive.
///
/// Lines end in `\r\n` because the keyboard handler keeps the terminal in
/// raw mode while a session runs.
pub struct LiveDisplay {
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveDisplay {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus,
            cancellation_token: CancellationToken::new(),
            task: None,
        }
    }

    pub fn start(&mut self) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(DISPLAYED_EVENTS.to_vec()),
            "live_display".to_string(),
        );
        let cancellation_token = self.cancellation_token.clone();

        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    event = receiver.recv() => {
                        let Some(event) = event else { break };
                        if let Some(line) = render_event(&event) {
                            let mut stdout = std::io::stdout().lock();
                            let _ = write!(stdout, "{}\r\n", line);
                            let _ = stdout.flush();
                        }
                    }
                }
            }
            debug!("Live display stopped");
        }));
    }

    /// Stop printing; events already queued are dropped
    pub async fn stop(&mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.task.take() {
            let _ = handle.await;
        }
    }
}
