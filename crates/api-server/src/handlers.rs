//! HTTP request handlers for API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;
use video_session_common::SessionError;
use video_session_orchestrator::StatusSnapshot;

use crate::types::{
    AckResponse, ErrorResponse, HealthResponse, ListQuery, ListResponse, NotReadyResponse,
    ResultsResponse, SubmitRequest, SubmitResponse,
};
use crate::ApiState;

/// Map a session error onto an HTTP status and body
fn error_response(err: &SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match err {
        SessionError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SessionError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
        SessionError::Saturated { .. } => (StatusCode::SERVICE_UNAVAILABLE, "saturated"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: err.to_string(),
        }),
    )
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Accept a media reference for background analysis
///
/// Returns immediately with a pollable session id; the analysis runs on the
/// orchestrator's worker pool.
pub async fn submit_session(
    State(state): State<ApiState>,
    Json(request): Json<SubmitRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let parameters = request.parameters.unwrap_or_else(|| serde_json::json!({}));
    let session_id = state
        .service
        .submit(request.analysis_type, parameters, request.media)
        .map_err(|e| error_response(&e))?;

    info!(
        "Accepted {} analysis as session {}",
        request.analysis_type, session_id
    );

    let snapshot = state
        .service
        .status(&session_id)
        .map_err(|e| error_response(&e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            session_id,
            status: snapshot.status,
            message: "Analysis queued".to_string(),
        }),
    ))
}

/// Poll current status and progress
pub async fn get_session_status(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    state
        .service
        .status(&session_id)
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Fetch the stored result payload of a completed session
///
/// A session that has not completed yields 400 with a body describing its
/// current status and progress instead.
pub async fn get_session_results(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    match state.service.results(&session_id) {
        Ok(results) => Ok(Json(ResultsResponse {
            session_id,
            results,
        })),
        Err(SessionError::InvalidState { .. }) => {
            let snapshot = state.service.status(&session_id).map_err(|e| {
                let (status, body) = error_response(&e);
                (status, Json(serde_json::json!(body.0)))
            })?;
            let body = NotReadyResponse {
                session_id,
                message: format!("Session not completed. Current status: {}", snapshot.status),
                status: snapshot.status,
                progress: snapshot.progress,
                current_step: snapshot.current_step,
            };
            Err((StatusCode::BAD_REQUEST, Json(serde_json::json!(body))))
        }
        Err(err) => {
            let (status, body) = error_response(&err);
            Err((status, Json(serde_json::json!(body.0))))
        }
    }
}

/// Request cooperative cancellation of a session
pub async fn cancel_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    state
        .service
        .cancel(&session_id)
        .map_err(|e| error_response(&e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AckResponse {
            session_id,
            status: "cancellation_requested".to_string(),
            message: "Cancellation requested; the session ends at the next safe point"
                .to_string(),
        }),
    ))
}

/// Remove a session and release its media bookkeeping
pub async fn cleanup_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    state
        .service
        .cleanup(&session_id)
        .map_err(|e| error_response(&e))?;

    Ok(Json(AckResponse {
        session_id,
        status: "cleaned_up".to_string(),
        message: "Session cleaned up".to_string(),
    }))
}

/// List sessions with registry statistics
pub async fn list_sessions(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let sessions: Vec<StatusSnapshot> = state
        .service
        .store()
        .list(query.status)
        .into_iter()
        .map(StatusSnapshot::from)
        .collect();

    Json(ListResponse {
        count: sessions.len(),
        stats: state.service.store().stats(),
        sessions,
    })
}
