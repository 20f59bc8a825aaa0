//! REST API Gateway for Async Video Analysis
//!
//! Translates HTTP requests into the core session operations: submit,
//! status, results, cancel, cleanup. All session state lives in process
//! memory; a restart discards every in-flight and completed session.

mod handlers;
mod stub;
mod types;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use video_session_orchestrator::{
    AnalysisEngine, OrchestratorConfig, SessionService, TaskOrchestrator,
};
use video_session_store::{SessionStore, SessionStoreConfig};

pub use handlers::*;
pub use stub::StubEngine;
pub use types::*;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Core session operations
    pub service: Arc<SessionService>,
    /// Registry, shared with the janitor
    pub store: Arc<SessionStore>,
    /// Worker pool, shared with the janitor
    pub orchestrator: Arc<TaskOrchestrator>,
}

impl ApiState {
    /// Create API state around an analysis engine with default configs
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(engine: Arc<dyn AnalysisEngine>) -> Self {
        Self::with_config(
            engine,
            SessionStoreConfig::default(),
            OrchestratorConfig::default(),
        )
    }

    /// Create API state with explicit store and orchestrator configs
    #[must_use]
    pub fn with_config(
        engine: Arc<dyn AnalysisEngine>,
        store_config: SessionStoreConfig,
        orchestrator_config: OrchestratorConfig,
    ) -> Self {
        let store = Arc::new(SessionStore::new(store_config));
        let orchestrator = Arc::new(TaskOrchestrator::new(
            store.clone(),
            engine,
            orchestrator_config,
        ));
        let service = Arc::new(SessionService::new(store.clone(), orchestrator.clone()));
        Self {
            service,
            store,
            orchestrator,
        }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Session lifecycle
        .route("/api/v1/sessions", post(submit_session).get(list_sessions))
        .route("/api/v1/sessions/{session_id}/status", get(get_session_status))
        .route(
            "/api/v1/sessions/{session_id}/results",
            get(get_session_results),
        )
        .route("/api/v1/sessions/{session_id}/cancel", post(cancel_session))
        .route("/api/v1/sessions/{session_id}", delete(cleanup_session))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
