use crate::api::WorkoutHistoryEntry;
use crate::exercise::ExerciseKind;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

pub const CSV_HEADER: &str = "Date,Exercise,Reps,Accuracy";

/// Fewer points than this cannot be drawn as a trend
pub const MIN_CHART_POINTS: usize = 2;

/// One session on the progress chart
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressPoint {
    /// Short label such as "Sep 11"
    pub date: String,
    pub completed_at: DateTime<Utc>,
    pub reps: u32,
    pub accuracy: f64,
}

/// Time-ordered progress for one exercise
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSeries {
    pub exercise: ExerciseKind,
    pub points: Vec<ProgressPoint>,
}

impl ProgressSeries {
    /// Entries for `exercise` with a completion time, oldest first
    pub fn from_history(entries: &[WorkoutHistoryEntry], exercise: ExerciseKind, tz: Tz) -> Self {
        let mut matching: Vec<(DateTime<Utc>, &WorkoutHistoryEntry)> = entries
            .iter()
            .filter(|entry| entry.exercise() == Some(exercise))
            .filter_map(|entry| entry.completion_timestamp.map(|at| (at, entry)))
            .collect();
        matching.sort_by_key(|(at, _)| *at);

        let points = matching
            .into_iter()
            .map(|(at, entry)| ProgressPoint {
                date: at.with_timezone(&tz).format("%b %-d").to_string(),
                completed_at: at,
                reps: entry.rep_count,
                accuracy: entry.average_accuracy,
            })
            .collect();

        Self { exercise, points }
    }

    pub fn is_chartable(&self) -> bool {
        self.points.len() >= MIN_CHART_POINTS
    }

    pub fn summary(&self) -> Option<ProgressSummary> {
        let best = self
            .points
            .iter()
            .fold(None::<&ProgressPoint>, |best, point| match best {
                Some(current) if current.reps >= point.reps => Some(current),
                _ => Some(point),
            })?;

        let total_accuracy: f64 = self.points.iter().map(|p| p.accuracy).sum();

        Some(ProgressSummary {
            exercise: self.exercise,
            sessions: self.points.len(),
            best_reps: best.reps,
            best_date: best.date.clone(),
            average_accuracy: total_accuracy / self.points.len() as f64,
        })
    }
}

/// Headline numbers for one exercise
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub exercise: ExerciseKind,
    pub sessions: usize,
    pub best_reps: u32,
    pub best_date: String,
    pub average_accuracy: f64,
}

/// Render every entry as CSV rows, oldest first, dates in `tz`
pub fn to_csv(entries: &[WorkoutHistoryEntry], tz: Tz) -> String {
    let mut sorted: Vec<&WorkoutHistoryEntry> = entries.iter().collect();
    sorted.sort_by_key(|entry| entry.completion_timestamp);

    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for entry in sorted {
        let date = entry
            .completion_timestamp
            .map(|at| at.with_timezone(&tz).format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            csv,
            "{},{},{},{}",
            date,
            csv_field(&entry.exercise_type),
            entry.rep_count,
            entry.average_accuracy.round() as i64
        );
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write the CSV export to `path`, returning the number of data rows
pub async fn write_csv(
    entries: &[WorkoutHistoryEntry],
    tz: Tz,
    path: &Path,
) -> crate::error::Result<usize> {
    let csv = to_csv(entries, tz);
    tokio::fs::write(path, csv).await?;
    info!("Exported {} workouts to {}", entries.len(), path.display());
    Ok(entries.len())
}
