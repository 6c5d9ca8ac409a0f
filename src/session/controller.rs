use super::state::{FinishReason, Phase, SessionSettings, SessionState};
use crate::announcer::FeedbackAnnouncer;
use crate::api::{AnalysisBackend, AnalysisResult, Credential, WorkoutRecord};
use crate::camera::CaptureSource;
use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent};
use crate::exercise::ExerciseKind;
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Default period of the capture/analyze loop
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

struct Inner {
    settings: SessionSettings,
    state: SessionState,
    cancel: CancellationToken,
    generation: u64,
}

/// Everything the controller and its tick task share
struct SessionCore {
    backend: Arc<dyn AnalysisBackend>,
    capture: Arc<dyn CaptureSource>,
    announcer: Arc<FeedbackAnnouncer>,
    event_bus: Arc<EventBus>,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<Phase>,
}

impl SessionCore {
    /// Move the session identified by `generation` to Finished.
    ///
    /// Runs under the state lock together with the cancellation check, so
    /// at most one caller wins and nothing is applied after it.
    fn try_finish(&self, generation: u64, reason: FinishReason) -> Option<SessionState> {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state.phase != Phase::Analyzing {
            return None;
        }
        inner.cancel.cancel();
        inner.state.finish(reason);
        Some(inner.state.clone())
    }

    /// Side effects of leaving the analyzing phase: release the camera,
    /// announce, publish, then wake phase watchers.
    async fn on_finished(&self, finished: &SessionState) {
        self.capture.release().await;
        self.event_bus.emit(SessionEvent::CameraStatusChanged {
            connected: false,
            timestamp: SystemTime::now(),
        });

        let reason = finished
            .finish_reason
            .clone()
            .unwrap_or(FinishReason::ManualStop);

        match &reason {
            FinishReason::GoalReached => {
                self.announcer.announce(reason.message());
                self.event_bus.emit(SessionEvent::GoalReached {
                    good: finished.counters.good,
                    rep_goal: finished.rep_goal,
                });
            }
            FinishReason::ConnectionLost(details) => {
                self.announcer.announce(reason.message());
                self.event_bus.emit(SessionEvent::ConnectionLost {
                    error: details.clone(),
                });
            }
            FinishReason::ManualStop => {}
        }

        info!(
            "Session finished ({}): {} good / {} bad / {} uncertain reps, {}s, avg accuracy {}%",
            reason.label(),
            finished.counters.good,
            finished.counters.bad,
            finished.counters.uncertain,
            finished.duration_seconds(),
            finished.average_accuracy()
        );

        self.event_bus.emit(SessionEvent::SessionFinished {
            session_id: finished.session_id.clone().unwrap_or_default(),
            reason: reason.label().to_string(),
            good: finished.counters.good,
            duration_seconds: finished.duration_seconds(),
        });

        self.phase_tx.send_replace(Phase::Finished);
    }
}

enum TickOutcome {
    Continue,
    Finished,
    Cancelled,
}

/// Per-session context owned by the tick task
struct TickLoop {
    core: Arc<SessionCore>,
    credential: Credential,
    exercise: ExerciseKind,
    cancel: CancellationToken,
    generation: u64,
    tick_interval: Duration,
}

impl TickLoop {
    async fn run(self) {
        debug!("Tick loop started (every {:?})", self.tick_interval);

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.tick().await {
                TickOutcome::Continue => {}
                TickOutcome::Finished | TickOutcome::Cancelled => break,
            }
        }

        // Cancelled without a transition (controller dropped mid-session)
        if let Some(finished) = self.core.try_finish(self.generation, FinishReason::ManualStop) {
            warn!("Tick loop cancelled while analyzing, closing session");
            self.core.on_finished(&finished).await;
        }

        debug!("Tick loop ended");
    }

    async fn tick(&self) -> TickOutcome {
        let captured = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return TickOutcome::Cancelled,
            captured = self.core.capture.snapshot() => captured,
        };

        let snapshot: Snapshot = match captured {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                trace!("No snapshot available, skipping tick");
                return TickOutcome::Continue;
            }
            Err(e) => {
                error!("Capture failed: {}", e);
                return self.fail(e.to_string()).await;
            }
        };

        let analyzed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return TickOutcome::Cancelled,
            analyzed = self.core.backend.analyze(&snapshot, self.exercise, &self.credential) => analyzed,
        };

        match analyzed {
            Ok(result) => self.apply(result).await,
            Err(e) => {
                error!("Analysis of snapshot {} failed: {}", snapshot.id, e);
                self.fail(e.to_string()).await
            }
        }
    }

    async fn apply(&self, result: AnalysisResult) -> TickOutcome {
        let finished = {
            let mut inner = self.core.inner.lock();
            if self.cancel.is_cancelled()
                || inner.generation != self.generation
                || inner.state.phase != Phase::Analyzing
            {
                debug!("Discarding analysis result that arrived after the session ended");
                return TickOutcome::Cancelled;
            }

            let goal_reached = inner.state.apply(&result);
            // Spoken while the lock is held so nothing is announced after stop()
            self.core.announcer.announce(&result.feedback);
            if goal_reached {
                inner.cancel.cancel();
                inner.state.finish(FinishReason::GoalReached);
                Some(inner.state.clone())
            } else {
                None
            }
        };

        self.core.event_bus.emit(SessionEvent::TickAnalyzed {
            good: result.counters.good,
            bad: result.counters.bad,
            uncertain: result.counters.uncertain,
            accuracy: result.accuracy,
            feedback: result.feedback.clone(),
        });

        match finished {
            Some(finished) => {
                info!("Rep goal of {} reached", finished.rep_goal);
                self.core.on_finished(&finished).await;
                TickOutcome::Finished
            }
            None => TickOutcome::Continue,
        }
    }

    async fn fail(&self, details: String) -> TickOutcome {
        match self
            .core
            .try_finish(self.generation, FinishReason::ConnectionLost(details))
        {
            Some(finished) => {
                self.core.on_finished(&finished).await;
                TickOutcome::Finished
            }
            None => TickOutcome::Cancelled,
        }
    }
}

/// Drives one workout session at a time: acquires the camera, polls the
/// analysis backend on a fixed interval and owns the session state.
pub struct SessionController {
    core: Arc<SessionCore>,
    tick_interval: Duration,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    starting: AtomicBool,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        capture: Arc<dyn CaptureSource>,
        announcer: Arc<FeedbackAnnouncer>,
        event_bus: Arc<EventBus>,
        settings: SessionSettings,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);

        Self {
            core: Arc::new(SessionCore {
                backend,
                capture,
                announcer,
                event_bus,
                inner: Mutex::new(Inner {
                    settings,
                    state: SessionState::idle(settings),
                    cancel: CancellationToken::new(),
                    generation: 0,
                }),
                phase_tx,
            }),
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_task: Mutex::new(None),
            starting: AtomicBool::new(false),
        }
    }

    /// Override the tick period (must be non-zero)
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Choose the exercise for the next session
    pub fn set_exercise(&self, exercise: ExerciseKind) -> Result<(), SessionError> {
        self.update_settings("set_exercise", |settings| settings.exercise = exercise)
    }

    /// Choose the rep goal for the next session
    pub fn set_rep_goal(&self, rep_goal: u32) -> Result<(), SessionError> {
        if rep_goal == 0 {
            return Err(SessionError::InvalidGoal);
        }
        self.update_settings("set_rep_goal", |settings| settings.rep_goal = rep_goal)
    }

    fn update_settings<F>(&self, operation: &str, update: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut SessionSettings),
    {
        let mut inner = self.core.inner.lock();
        if inner.state.phase == Phase::Analyzing {
            return Err(SessionError::InvalidState {
                operation: operation.to_string(),
                phase: inner.state.phase.to_string(),
            });
        }

        update(&mut inner.settings);
        // An idle state mirrors the settings; a finished one is left untouched
        if inner.state.phase == Phase::Idle {
            inner.state = SessionState::idle(inner.settings);
        }
        Ok(())
    }

    pub fn settings(&self) -> SessionSettings {
        self.core.inner.lock().settings
    }

    /// Copy of the current session state
    pub fn state(&self) -> SessionState {
        self.core.inner.lock().state.clone()
    }

    pub fn phase(&self) -> Phase {
        self.core.inner.lock().state.phase
    }

    /// Watch phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.core.phase_tx.subscribe()
    }

    /// Resolve once the current (or next) session has finished
    pub async fn wait_finished(&self) -> SessionState {
        let mut phase_rx = self.subscribe_phase();
        if phase_rx.wait_for(|phase| *phase == Phase::Finished).await.is_err() {
            warn!("Phase channel closed while waiting for session to finish");
        }
        self.state()
    }

    /// Record of the finished session, if there is one
    pub fn finished_record(&self) -> Option<WorkoutRecord> {
        self.core.inner.lock().state.record()
    }

    /// Begin a new session.
    ///
    /// Waits for the previous session to let go of the camera, acquires the
    /// capture source, resets server-side rep tracking and only then
    /// schedules the first tick. A finished session is replaced by a fresh
    /// state, never reused.
    pub async fn start(&self, credential: Option<Credential>) -> Result<(), SessionError> {
        let credential = credential.ok_or(SessionError::AuthRequired)?;

        {
            let inner = self.core.inner.lock();
            if inner.state.phase == Phase::Analyzing {
                return Err(SessionError::InvalidState {
                    operation: "start".to_string(),
                    phase: inner.state.phase.to_string(),
                });
            }
        }

        if self
            .starting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::InvalidState {
                operation: "start".to_string(),
                phase: "starting".to_string(),
            });
        }

        let result = self.start_inner(credential).await;
        self.starting.store(false, Ordering::SeqCst);
        result
    }

    async fn start_inner(&self, credential: Credential) -> Result<(), SessionError> {
        let core = &self.core;

        // A session that just finished may still be releasing the camera
        let previous = self.tick_task.lock().take();
        if let Some(handle) = previous {
            if let Err(e) = handle.await {
                error!("Previous tick task ended abnormally: {}", e);
            }
        }
        let mut phase_rx = core.phase_tx.subscribe();
        if phase_rx
            .wait_for(|phase| *phase != Phase::Analyzing)
            .await
            .is_err()
        {
            warn!("Phase channel closed while waiting for the previous session");
        }

        core.capture.acquire().await.map_err(|e| {
            warn!("Capture source {} unavailable: {}", core.capture.name(), e);
            SessionError::CameraUnavailable {
                details: e.to_string(),
            }
        })?;
        core.event_bus.emit(SessionEvent::CameraStatusChanged {
            connected: true,
            timestamp: SystemTime::now(),
        });

        if let Err(e) = core.backend.reset(&credential).await {
            error!("Failed to reset backend rep tracker: {}", e);
            core.capture.release().await;
            core.event_bus.emit(SessionEvent::CameraStatusChanged {
                connected: false,
                timestamp: SystemTime::now(),
            });
            return Err(SessionError::ResetFailed(e));
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        let (settings, generation) = {
            let mut inner = core.inner.lock();
            inner.generation += 1;
            inner.cancel = cancel.clone();
            inner.state = SessionState::begin(inner.settings, session_id.clone());
            (inner.settings, inner.generation)
        };
        core.phase_tx.send_replace(Phase::Analyzing);

        info!(
            "Session {} started: {} with a goal of {} reps",
            session_id,
            settings.exercise.label(),
            settings.rep_goal
        );
        core.event_bus.emit(SessionEvent::SessionStarted {
            session_id,
            exercise: settings.exercise,
            rep_goal: settings.rep_goal,
            timestamp: SystemTime::now(),
        });

        let tick_loop = TickLoop {
            core: Arc::clone(core),
            credential,
            exercise: settings.exercise,
            cancel,
            generation,
            tick_interval: self.tick_interval,
        };
        let handle = tokio::spawn(tick_loop.run());
        *self.tick_task.lock() = Some(handle);

        Ok(())
    }

    /// Stop the running session by hand.
    ///
    /// No tick result is applied once this has been called; a request still
    /// in flight is abandoned. Stopping a session that is not analyzing
    /// returns its state unchanged.
    pub async fn stop(&self) -> SessionState {
        let finished = {
            let mut inner = self.core.inner.lock();
            if inner.state.phase != Phase::Analyzing {
                return inner.state.clone();
            }
            inner.cancel.cancel();
            inner.state.finish(FinishReason::ManualStop);
            inner.state.clone()
        };

        info!("Session stopped by user");

        let handle = self.tick_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Tick task ended abnormally: {}", e);
            }
        }

        self.core.on_finished(&finished).await;
        finished
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.core.inner.lock().cancel.cancel();
    }
}
