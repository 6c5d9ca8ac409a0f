use crate::config::SpeechConfig;
use parking_lot::Mutex;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text-to-speech capability.
///
/// Implementations hand the utterance off and return immediately; any
/// queuing is up to the speech facility itself.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str);
}

/// Speaks nothing
pub struct NullSpeech;

impl SpeechSynthesizer for NullSpeech {
    fn speak(&self, _text: &str) {}
}

/// Writes utterances to the log instead of a speaker
pub struct LogSpeech;

impl SpeechSynthesizer for LogSpeech {
    fn speak(&self, text: &str) {
        info!(target: "repcoach::speech", "🔊 {}", text);
    }
}

/// Runs an external TTS program (e.g. `espeak`) once per utterance
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SpeechSynthesizer for CommandSpeech {
    fn speak(&self, text: &str) {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            // Reap in the background so finished TTS processes don't linger as zombies
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => warn!("Failed to run speech command '{}': {}", self.program, e),
        }
    }
}

/// Keeps every utterance; used in tests and dry runs
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

impl SpeechSynthesizer for RecordingSpeech {
    fn speak(&self, text: &str) {
        self.spoken.lock().push(text.to_string());
    }
}

/// Build the synthesizer described by the speech configuration
pub fn speech_from_config(config: &SpeechConfig) -> Arc<dyn SpeechSynthesizer> {
    if config.enabled {
        Arc::new(CommandSpeech::new(config.command.clone(), config.args.clone()))
    } else {
        Arc::new(LogSpeech)
    }
}

/// Speaks feedback text, suppressing immediate repeats
pub struct FeedbackAnnouncer {
    speech: Arc<dyn SpeechSynthesizer>,
    last_announced: Mutex<Option<String>>,
}

impl FeedbackAnnouncer {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            speech,
            last_announced: Mutex::new(None),
        }
    }

    /// Speak `text` unless it is blank or equal to the previous announcement.
    /// Returns whether speech was triggered.
    pub fn announce(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        {
            let mut last = self.last_announced.lock();
            if last.as_deref() == Some(text) {
                return false;
            }
            *last = Some(text.to_string());
        }

        debug!("Announcing: {}", text);
        self.speech.speak(text);
        true
    }

    pub fn last_announced(&self) -> Option<String> {
        self.last_announced.lock().clone()
    }
}
