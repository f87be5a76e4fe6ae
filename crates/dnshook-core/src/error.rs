//! Error types for the dnshook system
//!
//! Validation errors are reported synchronously to the event source.
//! Updater errors only ever surface in logs and [`HookEvent`]s because the
//! update runs after the event has been acknowledged.
//!
//! [`HookEvent`]: crate::orchestrator::HookEvent

use thiserror::Error;

/// Result type alias for dnshook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dnshook system
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed event data
    #[error("Validation error: {0}")]
    Validation(String),

    /// A before/after snapshot required by the event kind is absent
    #[error("Snapshot missing: {0}")]
    MissingSnapshot(String),

    /// Event kind other than created/updated/deleted
    #[error("Unsupported event type: {0}")]
    UnsupportedEvent(String),

    /// The external updater rejected or failed to apply a script
    #[error("Updater error ({updater}): {message}")]
    Updater {
        /// Updater name
        updater: String,
        /// Error message
        message: String,
    },

    /// The orchestrator is draining and accepts no further events
    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (spawning the updater, reading config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a missing snapshot error
    pub fn missing_snapshot(msg: impl Into<String>) -> Self {
        Self::MissingSnapshot(msg.into())
    }

    /// Create an unsupported event error
    pub fn unsupported_event(kind: impl Into<String>) -> Self {
        Self::UnsupportedEvent(kind.into())
    }

    /// Create an updater error
    pub fn updater(updater: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Updater {
            updater: updater.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error should be reported back to the event source as a
    /// rejected request rather than an internal failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::MissingSnapshot(_)
                | Self::UnsupportedEvent(_)
                | Self::Json(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
