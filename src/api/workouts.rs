use super::client::{ApiClient, Credential};
use crate::error::ApiError;
use crate::exercise::ExerciseKind;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A finished workout as submitted to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    #[serde(rename = "exercise_type")]
    pub exercise: ExerciseKind,
    pub rep_count: u32,
    pub duration_seconds: u64,
    pub average_accuracy: u8,
}

/// One stored workout as returned by the history endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkoutHistoryEntry {
    pub exercise_type: String,
    #[serde(default)]
    pub rep_count: u32,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub average_accuracy: f64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub completion_timestamp: Option<DateTime<Utc>>,
}

impl WorkoutHistoryEntry {
    /// Exercise kind, if the backend stored one this client knows
    pub fn exercise(&self) -> Option<ExerciseKind> {
        self.exercise_type.parse().ok()
    }
}

/// Accepts RFC 3339 strings, epoch milliseconds, and MongoDB extended JSON
/// (`{"$date": "..."}`, `{"$date": {"$numberLong": "..."}}`).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp_value))
}

fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => map
            .get("$date")
            .or_else(|| map.get("$numberLong"))
            .and_then(|inner| match inner {
                Value::String(s) if map.contains_key("$numberLong") => s
                    .parse::<i64>()
                    .ok()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
                other => parse_timestamp_value(other),
            }),
        _ => None,
    }
}

/// Best rep count per exercise
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalBests(HashMap<ExerciseKind, u32>);

impl PersonalBests {
    pub fn get(&self, exercise: ExerciseKind) -> u32 {
        self.0.get(&exercise).copied().unwrap_or(0)
    }

    pub fn insert(&mut self, exercise: ExerciseKind, reps: u32) {
        self.0.insert(exercise, reps);
    }

    /// A session is a new record only when it beats the stored best
    pub fn is_new_record(&self, exercise: ExerciseKind, reps: u32) -> bool {
        reps > self.get(exercise)
    }

    fn from_wire(raw: HashMap<String, Value>) -> Self {
        let mut bests = Self::default();
        for (key, value) in raw {
            let Ok(exercise) = key.parse::<ExerciseKind>() else {
                debug!("Ignoring personal best for unknown exercise '{}'", key);
                continue;
            };
            let reps = value
                .as_u64()
                .or_else(|| value.as_f64().map(|f| f.max(0.0).round() as u64));
            match reps {
                Some(reps) => bests.insert(exercise, reps.min(u32::MAX as u64) as u32),
                None => warn!("Personal best for {} is not a number: {}", exercise, value),
            }
        }
        bests
    }
}

/// Persistent workout storage on the backend
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn save(&self, record: &WorkoutRecord, credential: &Credential) -> Result<(), ApiError>;

    async fn history(&self, credential: &Credential) -> Result<Vec<WorkoutHistoryEntry>, ApiError>;

    async fn personal_bests(&self, credential: &Credential) -> Result<PersonalBests, ApiError>;
}

#[async_trait]
impl WorkoutStore for ApiClient {
    async fn save(&self, record: &WorkoutRecord, credential: &Credential) -> Result<(), ApiError> {
        self.send(self.post("/api/workout", credential).json(record))
            .await?;
        info!(
            "Workout saved: {} x{} in {}s",
            record.exercise, record.rep_count, record.duration_seconds
        );
        Ok(())
    }

    async fn history(&self, credential: &Credential) -> Result<Vec<WorkoutHistoryEntry>, ApiError> {
        let entries: Vec<WorkoutHistoryEntry> =
            self.send_json(self.get("/api/workout", credential)).await?;
        debug!("Fetched {} workout history entries", entries.len());
        Ok(entries)
    }

    async fn personal_bests(&self, credential: &Credential) -> Result<PersonalBests, ApiError> {
        let raw: HashMap<String, Value> = self
            .send_json(self.get("/api/personal_bests", credential))
            .await?;
        Ok(PersonalBests::from_wire(raw))
    }
}
