use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepcoachError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl RepcoachError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures talking to the analysis/storage backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Credential rejected by backend (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Backend unreachable: {details}")]
    Unreachable { details: String },

    #[error("Backend returned HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Malformed backend response: {details}")]
    Decode { details: String },
}

/// Capture source errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Capture source {source_name} unavailable: {details}")]
    Unavailable { source_name: String, details: String },

    #[error("Capture source is not acquired")]
    NotAcquired,

    #[error("Failed to read snapshot {path}: {details}")]
    SnapshotRead { path: String, details: String },
}

/// Session lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Authentication required to start a session")]
    AuthRequired,

    #[error("Camera unavailable: {details}")]
    CameraUnavailable { details: String },

    #[error("Operation '{operation}' not allowed while {phase}")]
    InvalidState { operation: String, phase: String },

    #[error("Rep goal must be a positive number")]
    InvalidGoal,

    #[error("Backend reset failed: {0}")]
    ResetFailed(ApiError),
}

/// Result persistence errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    #[error("Workout already saved")]
    AlreadySaved,

    #[error("No finished workout to save")]
    NothingToSave,

    #[error("Authentication required to save a workout")]
    AuthRequired,

    #[error("Failed to save workout: {0}")]
    Api(#[from] ApiError),
}

/// Event bus errors
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, RepcoachError>;
