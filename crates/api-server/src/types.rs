//! API request and response types

use serde::{Deserialize, Serialize};
use video_session_common::{AnalysisType, MediaRef};
use video_session_store::{SessionStatus, StoreStats};
use video_session_orchestrator::StatusSnapshot;

/// Submit a media reference for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Reference to already-persisted input media
    pub media: MediaRef,
    /// Type of analysis to run
    pub analysis_type: AnalysisType,
    /// Opaque analysis parameters
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// Response to an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Session identifier for polling
    pub session_id: String,
    /// Status at acceptance time (always `pending`)
    pub status: SessionStatus,
    /// Status message
    pub message: String,
}

/// Result payload of a completed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    /// Session identifier
    pub session_id: String,
    /// Stored analysis result
    pub results: serde_json::Value,
}

/// Returned when results are requested before the session completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotReadyResponse {
    /// Session identifier
    pub session_id: String,
    /// Current status
    pub status: SessionStatus,
    /// Current completion fraction in [0, 1]
    pub progress: f64,
    /// Current activity description
    pub current_step: String,
    /// Status message
    pub message: String,
}

/// Acknowledgement for cancel and cleanup operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    /// Session identifier
    pub session_id: String,
    /// Outcome of the operation
    pub status: String,
    /// Status message
    pub message: String,
}

/// Query parameters for the session listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Restrict to a single status
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

/// Session listing with registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    /// Matching sessions, newest first
    pub sessions: Vec<StatusSnapshot>,
    /// Number of sessions returned
    pub count: usize,
    /// Aggregate registry counts
    pub stats: StoreStats,
}

/// Error body for rejected operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code
    pub error: String,
    /// Human-readable message
    pub message: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}
