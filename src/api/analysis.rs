use super::client::{ApiClient, Credential};
use crate::error::ApiError;
use crate::exercise::ExerciseKind;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Rep tallies reported by the backend for the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepCounters {
    pub good: u32,
    pub bad: u32,
    pub uncertain: u32,
}

impl RepCounters {
    pub fn total(&self) -> u32 {
        self.good + self.bad + self.uncertain
    }
}

/// Outcome of analyzing one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub counters: RepCounters,
    /// Form accuracy, clamped to 0..=100
    pub accuracy: u8,
    pub feedback: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    image: String,
    exercise: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    good_reps: u32,
    #[serde(default)]
    bad_reps: u32,
    #[serde(default)]
    uncertain_reps: u32,
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    feedback: String,
}

impl From<AnalyzeResponse> for AnalysisResult {
    fn from(response: AnalyzeResponse) -> Self {
        Self {
            counters: RepCounters {
                good: response.good_reps,
                bad: response.bad_reps,
                uncertain: response.uncertain_reps,
            },
            accuracy: clamp_accuracy(response.accuracy),
            feedback: response.feedback,
        }
    }
}

pub(crate) fn clamp_accuracy(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Remote pose analysis. Implementations never retry; failures go to the caller as-is.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Clear server-side rep tracking before a session's first tick
    async fn reset(&self, credential: &Credential) -> Result<(), ApiError>;

    /// Analyze one snapshot of the given exercise
    async fn analyze(
        &self,
        snapshot: &Snapshot,
        exercise: ExerciseKind,
        credential: &Credential,
    ) -> Result<AnalysisResult, ApiError>;
}

#[async_trait]
impl AnalysisBackend for ApiClient {
    async fn reset(&self, credential: &Credential) -> Result<(), ApiError> {
        self.send(self.post("/api/reset", credential)).await?;
        info!("Backend rep tracker reset");
        Ok(())
    }

    async fn analyze(
        &self,
        snapshot: &Snapshot,
        exercise: ExerciseKind,
        credential: &Credential,
    ) -> Result<AnalysisResult, ApiError> {
        let body = AnalyzeRequest {
            image: snapshot.to_data_url(),
            exercise: exercise.as_str(),
        };

        let response: AnalyzeResponse = self
            .send_json(self.post("/api/analyze", credential).json(&body))
            .await?;

        debug!(
            "Snapshot {} analyzed: good={} bad={} uncertain={} accuracy={}",
            snapshot.id,
            response.good_reps,
            response.bad_reps,
            response.uncertain_reps,
            response.accuracy
        );

        Ok(response.into())
    }
}
