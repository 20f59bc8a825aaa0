//! Core session operations consumed by the API gateway

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use video_session_common::{
    AnalysisRequest, AnalysisType, ErrorInfo, MediaRef, Result, SessionError,
};
use video_session_store::{Session, SessionStatus, SessionStore};

use crate::orchestrator::TaskOrchestrator;

/// Pollable view of a session, without the result payload
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub progress: f64,
    pub current_step: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl From<Session> for StatusSnapshot {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            progress: session.progress,
            current_step: session.current_step,
            created_at: session.created_at,
            updated_at: session.updated_at,
            error: session.error,
        }
    }
}

/// Facade over the store and orchestrator exposing the core operations:
/// submit, status, results, cancel, cleanup
pub struct SessionService {
    store: Arc<SessionStore>,
    orchestrator: Arc<TaskOrchestrator>,
}

impl SessionService {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, orchestrator: Arc<TaskOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// The underlying registry (listing, stats)
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Validate the request, create a pending session, and enqueue its work
    ///
    /// Validation failures surface synchronously; a submission rejected by a
    /// saturated orchestrator leaves no session behind.
    pub fn submit(
        &self,
        analysis_type: AnalysisType,
        parameters: serde_json::Value,
        media: MediaRef,
    ) -> Result<String> {
        validate_parameters(analysis_type, &parameters)?;

        let session = self
            .store
            .create(analysis_type, parameters.clone(), media.clone());
        let request = AnalysisRequest {
            media,
            analysis_type,
            parameters,
        };
        if let Err(err) = self.orchestrator.submit(&session.id, request) {
            let _ = self.store.delete(&session.id);
            return Err(err);
        }
        Ok(session.id)
    }

    /// Current status, progress, and step; O(1), never blocks on a worker
    ///
    /// A failed session reports through the `error` field; polling never
    /// raises for it.
    pub fn status(&self, session_id: &str) -> Result<StatusSnapshot> {
        self.store.get(session_id).map(StatusSnapshot::from)
    }

    /// The stored result payload, available once the session completed
    ///
    /// Any other status yields `InvalidState` carrying the current status;
    /// the gateway renders that as a not-ready outcome. Repeated calls
    /// return the identical stored payload.
    pub fn results(&self, session_id: &str) -> Result<serde_json::Value> {
        let session = self.store.get(session_id)?;
        if session.status != SessionStatus::Completed {
            return Err(SessionError::invalid_state("results", session.status));
        }
        session
            .result
            .ok_or_else(|| SessionError::invalid_state("results", session.status))
    }

    /// Request cooperative cancellation (see [`TaskOrchestrator::cancel`])
    pub fn cancel(&self, session_id: &str) -> Result<()> {
        self.orchestrator.cancel(session_id)
    }

    /// Cancel best-effort, then remove the session and release its media
    /// bookkeeping
    ///
    /// The first call succeeds; repeating it returns `NotFound` with no
    /// further side effects.
    pub fn cleanup(&self, session_id: &str) -> Result<()> {
        let session = self.store.get(session_id)?;
        if !session.status.is_terminal() {
            if let Err(err) = self.orchestrator.cancel(session_id) {
                debug!("Cleanup cancel for session {} not applied: {}", session_id, err);
            }
        }
        let removed = self.store.delete(session_id)?;
        info!(
            "Cleaned up session {}; released media reference {}",
            session_id,
            removed.media.location()
        );
        Ok(())
    }
}

/// Synchronous submit-time validation
///
/// The payload stays opaque; only keys the analyzers are known to read are
/// range-checked, with the original form defaults in mind
/// (`min_significance` 6, `max_highlights` 10, `segment_duration` 15).
fn validate_parameters(
    analysis_type: AnalysisType,
    parameters: &serde_json::Value,
) -> Result<()> {
    let Some(map) = parameters.as_object() else {
        return Err(SessionError::Validation(
            "parameters must be a JSON object".to_string(),
        ));
    };

    let int_field = |key: &str| -> Result<Option<i64>> {
        match map.get(key) {
            None => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                SessionError::Validation(format!("{key} must be an integer"))
            }),
        }
    };

    match analysis_type {
        AnalysisType::Highlights => {
            if let Some(n) = int_field("min_significance")? {
                if !(1..=10).contains(&n) {
                    return Err(SessionError::Validation(
                        "min_significance must be between 1 and 10".to_string(),
                    ));
                }
            }
            if let Some(n) = int_field("max_highlights")? {
                if n < 1 {
                    return Err(SessionError::Validation(
                        "max_highlights must be at least 1".to_string(),
                    ));
                }
            }
        }
        AnalysisType::Workout => {
            if let Some(n) = int_field("segment_duration")? {
                if n < 1 {
                    return Err(SessionError::Validation(
                        "segment_duration must be at least 1 second".to_string(),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        let params = serde_json::json!({
            "min_significance": 6,
            "max_highlights": 10,
        });
        assert!(validate_parameters(AnalysisType::Highlights, &params).is_ok());
        assert!(validate_parameters(
            AnalysisType::Workout,
            &serde_json::json!({"segment_duration": 15})
        )
        .is_ok());
        assert!(validate_parameters(AnalysisType::Highlights, &serde_json::json!({})).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_object() {
        let err =
            validate_parameters(AnalysisType::Highlights, &serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_significance() {
        let err = validate_parameters(
            AnalysisType::Highlights,
            &serde_json::json!({"min_significance": 11}),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let err = validate_parameters(
            AnalysisType::Highlights,
            &serde_json::json!({"min_significance": "high"}),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[test]
    fn test_validate_ignores_keys_for_other_type() {
        // segment_duration is a workout knob; highlights leaves it opaque
        let params = serde_json::json!({"segment_duration": -5});
        assert!(validate_parameters(AnalysisType::Highlights, &params).is_ok());
    }
}
