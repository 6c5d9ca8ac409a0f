use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exercises the analysis backend knows how to count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Squat,
    Pushup,
    BicepCurl,
    Lunge,
    JumpingJack,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown exercise '{0}' (expected one of: squat, pushup, bicep_curl, lunge, jumping_jack)")]
pub struct UnknownExercise(pub String);

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 5] = [
        ExerciseKind::Squat,
        ExerciseKind::Pushup,
        ExerciseKind::BicepCurl,
        ExerciseKind::Lunge,
        ExerciseKind::JumpingJack,
    ];

    /// Identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Pushup => "pushup",
            ExerciseKind::BicepCurl => "bicep_curl",
            ExerciseKind::Lunge => "lunge",
            ExerciseKind::JumpingJack => "jumping_jack",
        }
    }

    /// Human-readable label ("bicep curl")
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = UnknownExercise;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ExerciseKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownExercise(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_identifiers() {
        let ids: Vec<&str> = ExerciseKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["squat", "pushup", "bicep_curl", "lunge", "jumping_jack"]);

        let json = serde_json::to_string(&ExerciseKind::JumpingJack).unwrap();
        assert_eq!(json, "\"jumping_jack\"");
    }

    #[test]
    fn test_parse_accepts_loose_spelling() {
        assert_eq!("bicep-curl".parse::<ExerciseKind>().unwrap(), ExerciseKind::BicepCurl);
        assert_eq!("Jumping Jack".parse::<ExerciseKind>().unwrap(), ExerciseKind::JumpingJack);
        assert!("burpee".parse::<ExerciseKind>().is_err());
    }

    #[test]
    fn test_label() {
        assert_eq!(ExerciseKind::BicepCurl.label(), "bicep curl");
        assert_eq!(ExerciseKind::Squat.to_string(), "squat");
    }
}
