/// Common types and error taxonomy for video session management
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced synchronously by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Operation '{operation}' not allowed while session is {status}")]
    InvalidState { operation: String, status: String },

    #[error("Orchestrator saturated: queue capacity {capacity} reached")]
    Saturated { capacity: usize },
}

impl SessionError {
    /// Build an `InvalidState` error for an operation rejected in `status`
    #[must_use]
    pub fn invalid_state(operation: &str, status: impl std::fmt::Display) -> Self {
        SessionError::InvalidState {
            operation: operation.to_string(),
            status: status.to_string(),
        }
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised by an analysis engine invocation
///
/// These never propagate to pollers; the orchestrator records them into the
/// session's [`ErrorInfo`] and marks the session failed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured error description stored on a failed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorInfo {
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&EngineError> for ErrorInfo {
    fn from(err: &EngineError) -> Self {
        let code = match err {
            EngineError::Cancelled => "cancelled",
            EngineError::Analysis(_) => "analysis_failed",
            EngineError::MediaUnavailable(_) => "media_unavailable",
            EngineError::Io(_) => "io_error",
        };
        ErrorInfo::new(code, err.to_string())
    }
}

/// Supported analysis types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// Find significant moments in a video
    Highlights,
    /// Break a workout video into exercise steps
    Workout,
}

impl AnalysisType {
    /// Get human-readable analysis name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Highlights => "highlights",
            Self::Workout => "workout",
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque reference to already-persisted input media
///
/// The session layer only bookkeeps this reference; it never touches the
/// underlying bytes and never deletes the media itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaRef {
    /// File already present on local storage
    #[serde(rename = "local")]
    Local { location: String },
    /// Media addressable by URL
    #[serde(rename = "url")]
    Url { location: String },
    /// S3 bucket location
    #[serde(rename = "s3")]
    S3 { location: String },
}

impl MediaRef {
    /// Get the location string regardless of variant
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Local { location } | Self::Url { location } | Self::S3 { location } => location,
        }
    }
}

/// Everything an analysis engine needs for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Input media reference
    pub media: MediaRef,
    /// Type of analysis to run
    pub analysis_type: AnalysisType,
    /// Opaque caller-supplied parameters
    pub parameters: serde_json::Value,
}
