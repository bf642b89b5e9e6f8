//! Error type shared by every Ship crate.

use thiserror::Error;

/// A convenience `Result` alias using [`ShipError`].
pub type ShipResult<T> = Result<T, ShipError>;

/// Top-level error type for the Ship workspace.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum ShipError {
    /// A malformed call rejected before any task was enqueued.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by an agent while working on a task.
    ///
    /// Displayed verbatim so it can be recorded on the task as-is.
    #[error("{0}")]
    Execution(String),

    /// An error from an outbound HTTP request (e.g. a model API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error from the orchestrator itself.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShipError {
    /// Shorthand for [`ShipError::Execution`].
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}
