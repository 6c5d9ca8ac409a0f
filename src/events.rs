use crate::error::EventBusError;
use crate::exercise::ExerciseKind;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted over the lifetime of a workout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Analysis loop started for a fresh session
    SessionStarted {
        session_id: String,
        exercise: ExerciseKind,
        rep_goal: u32,
        timestamp: SystemTime,
    },
    /// One tick's analysis result was applied
    TickAnalyzed {
        good: u32,
        bad: u32,
        uncertain: u32,
        accuracy: u8,
        feedback: String,
    },
    /// The rep goal was met
    GoalReached { good: u32, rep_goal: u32 },
    /// The backend could not be reached or answered with an error
    ConnectionLost { error: String },
    /// The session reached its terminal phase
    SessionFinished {
        session_id: String,
        reason: String,
        good: u32,
        duration_seconds: u64,
    },
    /// Capture source acquired or released
    CameraStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// The finished workout was stored by the backend
    WorkoutSaved {
        exercise: ExerciseKind,
        rep_count: u32,
    },
    /// Exit requested by the user or a signal
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SessionEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::SessionStarted {
                exercise, rep_goal, ..
            } => format!("Session started: {} x{}", exercise.label(), rep_goal),
            SessionEvent::TickAnalyzed {
                good,
                bad,
                uncertain,
                accuracy,
                ..
            } => format!(
                "Reps good={} bad={} uncertain={} accuracy={}%",
                good, bad, uncertain, accuracy
            ),
            SessionEvent::GoalReached { good, rep_goal } => {
                format!("Goal reached: {}/{}", good, rep_goal)
            }
            SessionEvent::ConnectionLost { error } => format!("Connection lost: {}", error),
            SessionEvent::SessionFinished {
                reason,
                good,
                duration_seconds,
                ..
            } => format!(
                "Session finished ({}): {} reps in {}s",
                reason, good, duration_seconds
            ),
            SessionEvent::CameraStatusChanged { connected, .. } => format!(
                "Camera {}",
                if *connected { "acquired" } else { "released" }
            ),
            SessionEvent::WorkoutSaved {
                exercise,
                rep_count,
            } => format!("Workout saved: {} x{}", exercise.label(), rep_count),
            SessionEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::TickAnalyzed { .. } => "tick_analyzed",
            SessionEvent::GoalReached { .. } => "goal_reached",
            SessionEvent::ConnectionLost { .. } => "connection_lost",
            SessionEvent::SessionFinished { .. } => "session_finished",
            SessionEvent::CameraStatusChanged { .. } => "camera_status_changed",
            SessionEvent::WorkoutSaved { .. } => "workout_saved",
            SessionEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            SessionEvent::SessionStarted { .. } | SessionEvent::SessionFinished { .. } => {
                info!("{}", event.description());
            }
            SessionEvent::ConnectionLost { error } => {
                error!("Connection to analysis backend lost: {}", error);
            }
            SessionEvent::CameraStatusChanged { connected, .. } => {
                if *connected {
                    info!("Camera acquired");
                } else {
                    info!("Camera released");
                }
            }
            SessionEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, treating "nobody is listening" as success
    pub fn emit(&self, event: SessionEvent) {
        if !self.has_subscribers() {
            return;
        }
        if let Err(e) = self.publish(event) {
            warn!("{}", e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&SessionEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SessionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<SessionEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next event passing the filter; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged, skipped {} events", self.name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Receiver '{}' closed", self.name);
                    return None;
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let delivered = bus
            .publish(SessionEvent::GoalReached {
                good: 3,
                rep_goal: 3,
            })
            .unwrap();
        assert_eq!(delivered, 1);

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "goal_reached");
        assert_eq!(event.description(), "Goal reached: 3/3");
    }

    #[test]
    fn test_publish_without_subscribers_fails_but_emit_does_not() {
        let bus = EventBus::new(4);
        assert!(!bus.has_subscribers());
        assert!(bus
            .publish(SessionEvent::ConnectionLost {
                error: "boom".to_string()
            })
            .is_err());

        bus.emit(SessionEvent::ConnectionLost {
            error: "boom".to_string(),
        });
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_events() {
        let bus = EventBus::with_debug_logging(10);
        let mut receiver = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["session_finished"]),
            "finish_watcher".to_string(),
        );

        bus.emit(SessionEvent::TickAnalyzed {
            good: 1,
            bad: 0,
            uncertain: 0,
            accuracy: 80,
            feedback: "Good depth".to_string(),
        });
        bus.emit(SessionEvent::SessionFinished {
            session_id: "s1".to_string(),
            reason: "manual stop".to_string(),
            good: 1,
            duration_seconds: 4,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "session_finished");
        assert_eq!(receiver.name(), "finish_watcher");
    }

    #[test]
    fn test_custom_filter() {
        let filter = EventFilter::Custom(|event| {
            matches!(event, SessionEvent::TickAnalyzed { accuracy, .. } if *accuracy >= 90)
        });
        let high = SessionEvent::TickAnalyzed {
            good: 1,
            bad: 0,
            uncertain: 0,
            accuracy: 95,
            feedback: String::new(),
        };
        let low = SessionEvent::TickAnalyzed {
            good: 1,
            bad: 0,
            uncertain: 0,
            accuracy: 40,
            feedback: String::new(),
        };
        assert!(filter.matches(&high));
        assert!(!filter.matches(&low));
        assert!(EventFilter::All.matches(&low));
    }
}
