//! Session entity and its state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use video_session_common::{AnalysisType, ErrorInfo, MediaRef, SessionError};

/// Current lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Queued, waiting for a worker
    Pending,
    /// A worker is executing the analysis
    Processing,
    /// Analysis finished successfully
    Completed,
    /// Analysis raised an error
    Failed,
    /// Cancelled before or during execution
    Cancelled,
    /// Reclaimed by the janitor after its TTL elapsed
    Expired,
}

impl SessionStatus {
    /// Get the lowercase wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Terminal statuses accept no further transitions
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit of asynchronous analysis work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID), immutable
    pub id: String,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Completion fraction in [0, 1], non-decreasing while processing
    pub progress: f64,
    /// Human-readable description of the current activity
    pub current_step: String,
    /// Type of analysis requested, immutable
    pub analysis_type: AnalysisType,
    /// Opaque caller-supplied parameters, immutable
    pub parameters: serde_json::Value,
    /// Reference to the persisted input media
    pub media: MediaRef,
    /// Result payload, present iff status is `Completed`
    pub result: Option<serde_json::Value>,
    /// Error description, present iff status is `Failed`
    pub error: Option<ErrorInfo>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Reclamation deadline, fixed at creation (`created_at` + TTL)
    pub expires_at: DateTime<Utc>,
}

/// The closed set of legal session mutations
///
/// Applying one of these is the only way session state changes after
/// creation; anything the state machine does not admit is rejected with
/// `InvalidState` and leaves the record untouched.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Worker picked the session up: `Pending` -> `Processing`
    BeginProcessing,
    /// Progress report while `Processing`; fraction is clamped to [0, 1]
    /// and never lowers the stored value
    Progress { fraction: f64, step: String },
    /// Engine returned a payload: `Processing` -> `Completed`
    Complete { result: serde_json::Value },
    /// Engine raised an error: `Processing` -> `Failed`
    Fail { error: ErrorInfo },
    /// Cancellation observed: `Pending` | `Processing` -> `Cancelled`
    Cancel,
    /// Janitor reclamation: any non-terminal -> `Expired`
    Expire,
}

impl SessionUpdate {
    /// Operation name used in `InvalidState` errors and logs
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::BeginProcessing => "begin_processing",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
        }
    }
}

impl Session {
    /// Create a fresh pending session
    #[must_use]
    pub fn new(
        id: String,
        analysis_type: AnalysisType,
        parameters: serde_json::Value,
        media: MediaRef,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id,
            status: SessionStatus::Pending,
            progress: 0.0,
            current_step: "Queued for analysis".to_string(),
            analysis_type,
            parameters,
            media,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// Apply a state-machine transition
    ///
    /// Returns `InvalidState` without mutating anything when the current
    /// status does not admit the update.
    pub(crate) fn apply(&mut self, update: SessionUpdate) -> Result<(), SessionError> {
        match update {
            SessionUpdate::BeginProcessing => {
                self.require(SessionStatus::Pending, "begin_processing")?;
                self.status = SessionStatus::Processing;
                self.progress = 0.0;
                self.current_step = "Analysis started".to_string();
            }
            SessionUpdate::Progress { fraction, step } => {
                self.require(SessionStatus::Processing, "progress")?;
                self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
                self.current_step = step;
            }
            SessionUpdate::Complete { result } => {
                self.require(SessionStatus::Processing, "complete")?;
                self.status = SessionStatus::Completed;
                self.progress = 1.0;
                self.current_step = "Analysis completed".to_string();
                self.result = Some(result);
            }
            SessionUpdate::Fail { error } => {
                self.require(SessionStatus::Processing, "fail")?;
                self.status = SessionStatus::Failed;
                self.current_step = "Analysis failed".to_string();
                self.error = Some(error);
            }
            SessionUpdate::Cancel => {
                if self.status != SessionStatus::Pending && self.status != SessionStatus::Processing
                {
                    return Err(SessionError::invalid_state("cancel", self.status));
                }
                self.status = SessionStatus::Cancelled;
                self.current_step = "Analysis cancelled".to_string();
            }
            SessionUpdate::Expire => {
                if self.status.is_terminal() {
                    return Err(SessionError::invalid_state("expire", self.status));
                }
                self.status = SessionStatus::Expired;
                self.current_step = "Session expired".to_string();
            }
        }
        Ok(())
    }

    fn require(&self, expected: SessionStatus, operation: &str) -> Result<(), SessionError> {
        if self.status != expected {
            return Err(SessionError::invalid_state(operation, self.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new(
            "s-1".to_string(),
            AnalysisType::Highlights,
            serde_json::json!({}),
            MediaRef::Local {
                location: "/tmp/video.mp4".to_string(),
            },
            Utc::now(),
            chrono::Duration::hours(24),
        )
    }

    #[test]
    fn test_new_session_is_pending() {
        let session = test_session();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.progress, 0.0);
        assert!(session.result.is_none());
        assert!(session.error.is_none());
        assert_eq!(session.expires_at, session.created_at + chrono::Duration::hours(24));
    }

    #[test]
    fn test_full_lifecycle_transitions() {
        let mut session = test_session();
        session.apply(SessionUpdate::BeginProcessing).unwrap();
        assert_eq!(session.status, SessionStatus::Processing);

        session
            .apply(SessionUpdate::Progress {
                fraction: 0.5,
                step: "Analyzing segment 2/4".to_string(),
            })
            .unwrap();
        assert_eq!(session.progress, 0.5);

        session
            .apply(SessionUpdate::Complete {
                result: serde_json::json!({"highlights": []}),
            })
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 1.0);
        assert!(session.result.is_some());
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut session = test_session();
        session.apply(SessionUpdate::BeginProcessing).unwrap();

        session
            .apply(SessionUpdate::Progress {
                fraction: 0.8,
                step: "step".to_string(),
            })
            .unwrap();
        session
            .apply(SessionUpdate::Progress {
                fraction: 0.3,
                step: "late report".to_string(),
            })
            .unwrap();
        assert_eq!(session.progress, 0.8);
        assert_eq!(session.current_step, "late report");

        session
            .apply(SessionUpdate::Progress {
                fraction: 7.5,
                step: "overshoot".to_string(),
            })
            .unwrap();
        assert_eq!(session.progress, 1.0);
    }

    #[test]
    fn test_progress_rejected_while_pending() {
        let mut session = test_session();
        let err = session
            .apply(SessionUpdate::Progress {
                fraction: 0.1,
                step: "too early".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(session.progress, 0.0);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let mut session = test_session();
        session.apply(SessionUpdate::Cancel).unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);

        for update in [
            SessionUpdate::BeginProcessing,
            SessionUpdate::Cancel,
            SessionUpdate::Expire,
            SessionUpdate::Complete {
                result: serde_json::json!({}),
            },
        ] {
            let err = session.apply(update).unwrap_err();
            assert!(matches!(err, SessionError::InvalidState { .. }));
        }
        assert_eq!(session.status, SessionStatus::Cancelled);
    }

    #[test]
    fn test_fail_requires_processing() {
        let mut session = test_session();
        let err = session
            .apply(SessionUpdate::Fail {
                error: ErrorInfo::new("analysis_failed", "boom"),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));

        session.apply(SessionUpdate::BeginProcessing).unwrap();
        session
            .apply(SessionUpdate::Fail {
                error: ErrorInfo::new("analysis_failed", "boom"),
            })
            .unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.error.is_some());
        assert!(session.result.is_none());
    }

    #[test]
    fn test_expire_from_any_non_terminal() {
        let mut pending = test_session();
        pending.apply(SessionUpdate::Expire).unwrap();
        assert_eq!(pending.status, SessionStatus::Expired);

        let mut processing = test_session();
        processing.apply(SessionUpdate::BeginProcessing).unwrap();
        processing.apply(SessionUpdate::Expire).unwrap();
        assert_eq!(processing.status, SessionStatus::Expired);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SessionStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let json = serde_json::to_string(&SessionStatus::Expired).unwrap();
        assert_eq!(json, "\"expired\"");
    }
}
