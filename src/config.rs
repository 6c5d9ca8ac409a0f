use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::exercise::ExerciseKind;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepcoachConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub speech: SpeechConfig,
    pub export: ExportConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the analysis backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Bearer token issued by the login provider
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Period of the capture/analyze loop in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Exercise selected when none is given on the command line
    #[serde(default = "default_exercise")]
    pub exercise: ExerciseKind,

    /// Rep goal used when none is given on the command line
    #[serde(default = "default_rep_goal")]
    pub rep_goal: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSourceKind {
    /// Replay still frames from a directory
    Directory,
    /// Placeholder frames, for dry runs against a backend
    Synthetic,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Which capture source to open
    #[serde(default = "default_capture_source")]
    pub source: CaptureSourceKind,

    /// Directory holding JPEG/PNG frames for the directory source
    #[serde(default = "default_frames_path")]
    pub frames_path: String,

    /// Start over from the first frame once the directory is exhausted
    #[serde(default = "default_loop_frames")]
    pub loop_frames: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SpeechConfig {
    /// Speak feedback aloud
    #[serde(default = "default_speech_enabled")]
    pub enabled: bool,

    /// Text-to-speech program; feedback text is appended as the last argument
    #[serde(default = "default_speech_command")]
    pub command: String,

    /// Extra arguments passed before the text
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// IANA timezone used for dates in exports and progress labels
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Default CSV output path
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl RepcoachConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("repcoach.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("api.base_url", default_base_url())?
            .set_default("api.timeout_ms", default_timeout_ms())?
            .set_default("session.tick_interval_ms", default_tick_interval_ms())?
            .set_default("session.exercise", default_exercise().as_str())?
            .set_default("session.rep_goal", default_rep_goal())?
            .set_default("capture.source", "synthetic")?
            .set_default("capture.frames_path", default_frames_path())?
            .set_default("capture.loop_frames", default_loop_frames())?
            .set_default("speech.enabled", default_speech_enabled())?
            .set_default("speech.command", default_speech_command())?
            .set_default("export.timezone", default_timezone())?
            .set_default("export.csv_path", default_csv_path())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // REPCOACH__API__TOKEN style keeps underscores in field names intact
            .add_source(Environment::with_prefix("REPCOACH").separator("__"))
            .build()?;

        let config: RepcoachConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "API base_url must not be empty".to_string(),
            ));
        }

        if self.api.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "API timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Session tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.rep_goal == 0 {
            return Err(ConfigError::Message(
                "Session rep_goal must be greater than 0".to_string(),
            ));
        }

        if self.capture.source == CaptureSourceKind::Directory
            && self.capture.frames_path.trim().is_empty()
        {
            return Err(ConfigError::Message(
                "Capture frames_path is required for the directory source".to_string(),
            ));
        }

        if self.speech.enabled && self.speech.command.trim().is_empty() {
            return Err(ConfigError::Message(
                "Speech command must be set when speech is enabled".to_string(),
            ));
        }

        if self.export.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown export timezone '{}'",
                self.export.timezone
            )));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy with the bearer token masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api.token.is_some() {
            copy.api.token = Some("***".to_string());
        }
        copy
    }

    /// Export timezone, falling back to UTC for unparsable names
    pub fn export_timezone(&self) -> chrono_tz::Tz {
        self.export.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl Default for RepcoachConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: default_base_url(),
                timeout_ms: default_timeout_ms(),
                token: None,
            },
            session: SessionConfig {
                tick_interval_ms: default_tick_interval_ms(),
                exercise: default_exercise(),
                rep_goal: default_rep_goal(),
            },
            capture: CaptureConfig {
                source: default_capture_source(),
                frames_path: default_frames_path(),
                loop_frames: default_loop_frames(),
            },
            speech: SpeechConfig {
                enabled: default_speech_enabled(),
                command: default_speech_command(),
                args: Vec::new(),
            },
            export: ExportConfig {
                timezone: default_timezone(),
                csv_path: default_csv_path(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}

fn default_tick_interval_ms() -> u64 {
    200
}
fn default_exercise() -> ExerciseKind {
    ExerciseKind::Squat
}
fn default_rep_goal() -> u32 {
    10
}

fn default_capture_source() -> CaptureSourceKind {
    CaptureSourceKind::Synthetic
}
fn default_frames_path() -> String {
    "./frames".to_string()
}
fn default_loop_frames() -> bool {
    true
}

fn default_speech_enabled() -> bool {
    false
}
fn default_speech_command() -> String {
    "espeak".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_csv_path() -> String {
    "workout_progress.csv".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RepcoachConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.session.tick_interval(), Duration::from_millis(200));
        assert_eq!(config.session.exercise, ExerciseKind::Squat);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "http://10.0.0.5:5000"
token = "secret-token"

[session]
exercise = "bicep_curl"
rep_goal = 12

[capture]
source = "directory"
frames_path = "/tmp/frames"
"#
        )
        .unwrap();

        let config = RepcoachConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.api.base_url, "http://10.0.0.5:5000");
        assert_eq!(config.api.token.as_deref(), Some("secret-token"));
        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.session.exercise, ExerciseKind::BicepCurl);
        assert_eq!(config.session.rep_goal, 12);
        assert_eq!(config.session.tick_interval_ms, 200);
        assert_eq!(config.capture.source, CaptureSourceKind::Directory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = RepcoachConfig::load_from_file("/nonexistent/repcoach.toml").unwrap();
        assert_eq!(config.session.rep_goal, 10);
        assert_eq!(config.capture.source, CaptureSourceKind::Synthetic);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RepcoachConfig::default();

        config.session.rep_goal = 0;
        assert!(config.validate().is_err());
        config.session.rep_goal = 5;

        config.session.tick_interval_ms = 0;
        assert!(config.validate().is_err());
        config.session.tick_interval_ms = 200;

        config.export.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
        config.export.timezone = "Europe/Berlin".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.export_timezone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_redacted_masks_token() {
        let mut config = RepcoachConfig::default();
        config.api.token = Some("abc".to_string());
        assert_eq!(config.redacted().api.token.as_deref(), Some("***"));
        assert_eq!(config.api.token.as_deref(), Some("abc"));
    }
}
