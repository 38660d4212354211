use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the watchdeck registry and its surfaces
#[derive(Debug, Error)]
pub enum WatchdeckError {
    // Launch errors, the only ones a caller is expected to act on
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Invalid instance name '{0}': must be a single file name segment")]
    InvalidName(String),

    #[error("Monitor executable does not exist: {}", .0.display())]
    ExecutableMissing(PathBuf),

    #[error("Failed to launch monitor: {0}")]
    SpawnFailed(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    // State store errors
    #[error("Failed to save state: {0}")]
    StateSaveError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // IPC errors
    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Failed to connect to daemon: {0}")]
    ConnectionError(String),

    #[error("IPC protocol error: {0}")]
    ProtocolError(String),

    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Daemon already running (PID: {0})")]
    DaemonAlreadyRunning(u32),

    #[error("PID file error: {0}")]
    PidFileError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("{0}")]
    Other(String),
}

impl WatchdeckError {
    /// Whether the error came from bad user input rather than the environment
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WatchdeckError::EmptyField(_) | WatchdeckError::InvalidName(_)
        )
    }
}

/// Result type alias for watchdeck operations
pub type Result<T> = std::result::Result<T, WatchdeckError>;
