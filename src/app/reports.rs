use super::RepcoachOrchestrator;
use crate::api::{Credential, PersonalBests, WorkoutHistoryEntry, WorkoutStore};
use crate::error::{RepcoachError, Result};
use crate::exercise::ExerciseKind;
use crate::progress::{self, ProgressSeries, MIN_CHART_POINTS};
use chrono_tz::Tz;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Progress per exercise, ready for printing
#[derive(Debug, Clone)]
pub struct HistoryReport {
    pub series: Vec<ProgressSeries>,
}

impl HistoryReport {
    /// Series for `exercise`, or for every exercise with at least one session
    pub fn build(entries: &[WorkoutHistoryEntry], exercise: Option<ExerciseKind>, tz: Tz) -> Self {
        let series = match exercise {
            Some(exercise) => vec![ProgressSeries::from_history(entries, exercise, tz)],
            None => ExerciseKind::ALL
                .iter()
                .map(|exercise| ProgressSeries::from_history(entries, *exercise, tz))
                .filter(|series| !series.points.is_empty())
                .collect(),
        };
        Self { series }
    }

    pub fn render(&self) -> String {
        if self.series.is_empty() {
            return "No workouts recorded yet.\n".to_string();
        }

        let mut out = String::new();
        for series in &self.series {
            let name = series.exercise.label();
            let Some(summary) = series.summary() else {
                let _ = writeln!(out, "{}: no sessions yet", name);
                continue;
            };

            let _ = writeln!(
                out,
                "{}: {} sessions, best {} reps ({}), average accuracy {:.0}%",
                name,
                summary.sessions,
                summary.best_reps,
                summary.best_date,
                summary.average_accuracy
            );

            if series.is_chartable() {
                for point in &series.points {
                    let _ = writeln!(
                        out,
                        "  {:<7} {:>4} reps  {:>3.0}%",
                        point.date, point.reps, point.accuracy
                    );
                }
            } else {
                let _ = writeln!(
                    out,
                    "  Complete at least {} {} sessions to see your progress.",
                    MIN_CHART_POINTS, name
                );
            }
        }
        out
    }
}

/// Best rep count per exercise
#[derive(Debug, Clone)]
pub struct BestsReport {
    pub bests: PersonalBests,
}

impl BestsReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for exercise in ExerciseKind::ALL {
            let best = self.bests.get(exercise);
            if best == 0 {
                let _ = writeln!(out, "{:<13} -", exercise.label());
            } else {
                let _ = writeln!(out, "{:<13} {} reps", exercise.label(), best);
            }
        }
        out
    }
}

impl RepcoachOrchestrator {
    fn require_credential(&self) -> Result<&Credential> {
        self.credential.as_ref().ok_or_else(|| {
            RepcoachError::component("api", "a bearer token is required (--token or REPCOACH__API__TOKEN)")
        })
    }

    pub async fn history_report(&self, exercise: Option<ExerciseKind>) -> Result<HistoryReport> {
        let entries = self.api.history(self.require_credential()?).await?;
        Ok(HistoryReport::build(
            &entries,
            exercise,
            self.config.export_timezone(),
        ))
    }

    pub async fn bests_report(&self) -> Result<BestsReport> {
        let bests = self.api.personal_bests(self.require_credential()?).await?;
        Ok(BestsReport { bests })
    }

    /// Write the full history as CSV; `output` overrides the configured path
    pub async fn export_history(&self, output: Option<&Path>) -> Result<(PathBuf, usize)> {
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.config.export.csv_path));

        let entries = self.api.history(self.require_credential()?).await?;
        let rows = progress::write_csv(&entries, self.config.export_timezone(), &path).await?;
        info!("History export written to {}", path.display());
        Ok((path, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(exercise: &str, reps: u32, day: u32) -> WorkoutHistoryEntry {
        WorkoutHistoryEntry {
            exercise_type: exercise.to_string(),
            rep_count: reps,
            duration_seconds: 30,
            average_accuracy: 75.0,
            completion_timestamp: Utc.with_ymd_and_hms(2025, 9, day, 12, 0, 0).single(),
        }
    }

    #[test]
    fn test_history_report_lists_only_used_exercises() {
        let entries = vec![entry("squat", 10, 1), entry("squat", 14, 3), entry("lunge", 6, 2)];
        let report = HistoryReport::build(&entries, None, Tz::UTC);
        let exercises: Vec<ExerciseKind> = report.series.iter().map(|s| s.exercise).collect();
        assert_eq!(exercises, vec![ExerciseKind::Squat, ExerciseKind::Lunge]);

        let text = report.render();
        assert!(text.contains("squat: 2 sessions, best 14 reps (Sep 3), average accuracy 75%"));
        assert!(text.contains("  Sep 1"));
        assert!(text.contains("Complete at least 2 lunge sessions"));
    }

    #[test]
    fn test_history_report_for_unused_exercise() {
        let report = HistoryReport::build(&[], Some(ExerciseKind::Pushup), Tz::UTC);
        assert_eq!(report.render(), "pushup: no sessions yet\n");
        assert_eq!(
            HistoryReport::build(&[], None, Tz::UTC).render(),
            "No workouts recorded yet.\n"
        );
    }

    #[test]
    fn test_bests_report() {
        let mut bests = PersonalBests::default();
        bests.insert(ExerciseKind::JumpingJack, 40);
        let text = BestsReport { bests }.render();
        assert!(text.contains("jumping jack  40 reps"));
        assert!(text
            .lines()
            .any(|line| line.starts_with("squat") && line.ends_with(" -")));
    }
}
