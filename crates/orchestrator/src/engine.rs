//! Analysis engine contract

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use video_session_common::{AnalysisRequest, EngineError};
use video_session_store::{SessionStore, SessionUpdate};

/// The external media-analysis computation
///
/// An invocation is blocking and compute-heavy; the orchestrator runs it on
/// a blocking thread. Implementations should call
/// [`ProgressReporter::report`] as work advances and check the cancellation
/// token at safe points (e.g. between independently-analyzable segments),
/// returning [`EngineError::Cancelled`] after observing it. Cancellation is
/// cooperative only; an engine that never checks the token simply runs to
/// completion.
pub trait AnalysisEngine: Send + Sync + 'static {
    /// Run one analysis to completion, cancellation, or error
    fn execute(
        &self,
        request: &AnalysisRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, EngineError>;
}

/// Forwards engine progress reports into the session store
///
/// Cheap and non-blocking for the caller; safe to invoke repeatedly and at
/// any cadence from the engine's own execution context. Reports against a
/// session that has gone terminal concurrently are dropped.
pub struct ProgressReporter {
    store: Arc<SessionStore>,
    session_id: String,
}

impl ProgressReporter {
    /// Bind a reporter to a session
    ///
    /// Normally constructed by the orchestrator's workers; exposed so engine
    /// implementations can be exercised directly in tests.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, session_id: String) -> Self {
        Self { store, session_id }
    }

    /// Record a completion fraction in [0, 1] and a step description
    pub fn report(&self, fraction: f64, step: &str) {
        let update = SessionUpdate::Progress {
            fraction,
            step: step.to_string(),
        };
        if let Err(err) = self.store.update(&self.session_id, update) {
            debug!(
                "Dropped progress report for session {}: {}",
                self.session_id, err
            );
        }
    }
}
