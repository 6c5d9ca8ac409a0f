use crate::api::{Credential, WorkoutRecord, WorkoutStore};
use crate::error::PersistError;
use crate::events::{EventBus, SessionEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct Pending {
    record: WorkoutRecord,
    saved: bool,
}

/// Holds the result of a finished session until it has been stored.
///
/// A record is submitted at most once. A failed save keeps it so the
/// user can retry without repeating the workout.
pub struct ResultPersister {
    store: Arc<dyn WorkoutStore>,
    pending: Mutex<Option<Pending>>,
    event_bus: Option<Arc<EventBus>>,
}

impl ResultPersister {
    pub fn new(store: Arc<dyn WorkoutStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(None),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Hold `record` for saving, replacing whatever was held before
    pub async fn stage(&self, record: WorkoutRecord) {
        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.as_ref() {
            if !previous.saved {
                warn!(
                    "Replacing unsaved workout ({} x{})",
                    previous.record.exercise, previous.record.rep_count
                );
            }
        }
        *pending = Some(Pending {
            record,
            saved: false,
        });
    }

    pub async fn pending(&self) -> Option<WorkoutRecord> {
        self.pending.lock().await.as_ref().map(|p| p.record.clone())
    }

    pub async fn is_saved(&self) -> bool {
        self.pending
            .lock()
            .await
            .as_ref()
            .map(|p| p.saved)
            .unwrap_or(false)
    }

    /// Submit the held record.
    ///
    /// Concurrent calls are serialized, so only the first one reaches the
    /// backend and the rest see `AlreadySaved`.
    pub async fn save(&self, credential: Option<&Credential>) -> Result<WorkoutRecord, PersistError> {
        let credential = credential.ok_or(PersistError::AuthRequired)?;

        let mut pending = self.pending.lock().await;
        let entry = pending.as_mut().ok_or(PersistError::NothingToSave)?;
        if entry.saved {
            return Err(PersistError::AlreadySaved);
        }

        if let Err(e) = self.store.save(&entry.record, credential).await {
            warn!("Saving workout failed, keeping it for retry: {}", e);
            return Err(PersistError::Api(e));
        }

        entry.saved = true;
        let record = entry.record.clone();
        info!(
            "Workout saved: {} x{} in {}s ({}% accuracy)",
            record.exercise.label(),
            record.rep_count,
            record.duration_seconds,
            record.average_accuracy
        );

        if let Some(event_bus) = &self.event_bus {
            event_bus.emit(SessionEvent::WorkoutSaved {
                exercise: record.exercise,
                rep_count: record.rep_count,
            });
        }

        Ok(record)
    }

    /// Forget the held record, saved or not
    pub async fn discard(&self) -> Option<WorkoutRecord> {
        self.pending.lock().await.take().map(|p| p.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PersonalBests, WorkoutHistoryEntry};
    use crate::error::ApiError;
    use crate::exercise::ExerciseKind;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeStore {
        outcomes: SyncMutex<VecDeque<Result<(), ApiError>>>,
        saved: SyncMutex<Vec<WorkoutRecord>>,
    }

    impl FakeStore {
        fn with_outcomes(outcomes: Vec<Result<(), ApiError>>) -> Self {
            Self {
                outcomes: SyncMutex::new(outcomes.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl WorkoutStore for FakeStore {
        async fn save(&self, record: &WorkoutRecord, _credential: &Credential) -> Result<(), ApiError> {
            let outcome = self.outcomes.lock().pop_front().unwrap_or(Ok(()));
            if outcome.is_ok() {
                self.saved.lock().push(record.clone());
            }
            outcome
        }

        async fn history(&self, _credential: &Credential) -> Result<Vec<WorkoutHistoryEntry>, ApiError> {
            Ok(Vec::new())
        }

        async fn personal_bests(&self, _credential: &Credential) -> Result<PersonalBests, ApiError> {
            Ok(PersonalBests::default())
        }
    }

    fn record() -> WorkoutRecord {
        WorkoutRecord {
            exercise: ExerciseKind::Squat,
            rep_count: 12,
            duration_seconds: 95,
            average_accuracy: 81,
        }
    }

    fn credential() -> Credential {
        Credential::new("token")
    }

    #[tokio::test]
    async fn test_second_save_is_rejected() {
        let store = Arc::new(FakeStore::default());
        let event_bus = Arc::new(EventBus::new(16));
        let mut events = event_bus.subscribe();
        let persister = ResultPersister::new(store.clone()).with_event_bus(event_bus);

        persister.stage(record()).await;
        let saved = persister.save(Some(&credential())).await.unwrap();
        assert_eq!(saved, record());
        assert!(persister.is_saved().await);

        assert_eq!(
            persister.save(Some(&credential())).await,
            Err(PersistError::AlreadySaved)
        );
        assert_eq!(store.saved.lock().len(), 1);
        assert_eq!(events.try_recv().unwrap().event_type(), "workout_saved");
    }

    #[tokio::test]
    async fn test_failed_save_keeps_record_for_retry() {
        let store = Arc::new(FakeStore::with_outcomes(vec![Err(ApiError::Unreachable {
            details: "connection reset".to_string(),
        })]));
        let persister = ResultPersister::new(store.clone());
        persister.stage(record()).await;

        let err = persister.save(Some(&credential())).await.unwrap_err();
        assert!(matches!(err, PersistError::Api(ApiError::Unreachable { .. })));
        assert!(!persister.is_saved().await);
        assert_eq!(persister.pending().await, Some(record()));

        persister.save(Some(&credential())).await.unwrap();
        assert_eq!(store.saved.lock().as_slice(), &[record()]);
    }

    #[tokio::test]
    async fn test_nothing_to_save_and_missing_credential() {
        let persister = ResultPersister::new(Arc::new(FakeStore::default()));
        assert_eq!(
            persister.save(Some(&credential())).await,
            Err(PersistError::NothingToSave)
        );

        persister.stage(record()).await;
        assert_eq!(persister.save(None).await, Err(PersistError::AuthRequired));
        assert!(!persister.is_saved().await);
    }

    #[tokio::test]
    async fn test_discard_then_stage_allows_new_save() {
        let store = Arc::new(FakeStore::default());
        let persister = ResultPersister::new(store.clone());

        persister.stage(record()).await;
        persister.save(Some(&credential())).await.unwrap();
        assert_eq!(persister.discard().await, Some(record()));
        assert_eq!(persister.pending().await, None);

        let next = WorkoutRecord {
            rep_count: 5,
            ..record()
        };
        persister.stage(next.clone()).await;
        persister.save(Some(&credential())).await.unwrap();
        assert_eq!(store.saved.lock().as_slice(), &[record(), next]);
    }
}
