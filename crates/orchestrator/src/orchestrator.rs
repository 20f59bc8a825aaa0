//! Bounded worker pool executing analysis invocations

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use video_session_common::{AnalysisRequest, EngineError, ErrorInfo, Result, SessionError};
use video_session_store::{SessionStore, SessionUpdate};

use crate::engine::{AnalysisEngine, ProgressReporter};

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of parallel workers; caps concurrent engine invocations
    pub workers: usize,
    /// Work items allowed to queue beyond the pool before submissions are
    /// rejected as saturated
    pub queue_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
        }
    }
}

/// A queued engine invocation bound to a session id
struct WorkItem {
    session_id: String,
    request: AnalysisRequest,
    cancel: CancellationToken,
}

/// Store-internal record of an in-flight or queued unit of work
struct TaskHandle {
    cancel: CancellationToken,
}

/// Schedules analysis invocations on a fixed pool of workers
///
/// Work items are dispatched first-in-first-out; a session stays `Pending`
/// until a worker actually dequeues it. Every outcome (completion, failure,
/// observed cancellation) is written back through the session store's
/// atomic update.
pub struct TaskOrchestrator {
    store: Arc<SessionStore>,
    queue: Mutex<Option<mpsc::Sender<WorkItem>>>,
    queue_capacity: usize,
    tasks: Arc<Mutex<HashMap<String, TaskHandle>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskOrchestrator {
    /// Create the orchestrator and spawn its worker pool
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        engine: Arc<dyn AnalysisEngine>,
        config: OrchestratorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<WorkItem>(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let tasks: Arc<Mutex<HashMap<String, TaskHandle>>> =
            Arc::new(Mutex::new(HashMap::with_capacity(16)));

        let mut workers = Vec::with_capacity(config.workers.max(1));
        for worker_id in 0..config.workers.max(1) {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                store.clone(),
                engine.clone(),
                rx.clone(),
                tasks.clone(),
            )));
        }
        info!("Orchestrator started with {} workers", workers.len());

        Self {
            store,
            queue: Mutex::new(Some(tx)),
            queue_capacity: config.queue_capacity.max(1),
            tasks,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue a unit of work for a pending session
    ///
    /// Rejects with `Saturated` when the queue is full or the orchestrator
    /// has been shut down.
    pub fn submit(&self, session_id: &str, request: AnalysisRequest) -> Result<()> {
        let cancel = CancellationToken::new();
        let item = WorkItem {
            session_id: session_id.to_string(),
            request,
            cancel: cancel.clone(),
        };
        self.tasks
            .lock()
            .insert(session_id.to_string(), TaskHandle { cancel });

        let sender = self.queue.lock().clone();
        let outcome = match sender {
            Some(tx) => tx.try_send(item),
            None => {
                self.tasks.lock().remove(session_id);
                warn!("Submission for session {} after shutdown", session_id);
                return Err(SessionError::Saturated {
                    capacity: self.queue_capacity,
                });
            }
        };

        match outcome {
            Ok(()) => {
                debug!("Enqueued work for session {}", session_id);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.tasks.lock().remove(session_id);
                warn!(
                    "Work queue full ({} items); rejecting session {}",
                    self.queue_capacity, session_id
                );
                Err(SessionError::Saturated {
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.tasks.lock().remove(session_id);
                warn!("Work queue closed; rejecting session {}", session_id);
                Err(SessionError::Saturated {
                    capacity: self.queue_capacity,
                })
            }
        }
    }

    /// Request cooperative cancellation of a session's work
    ///
    /// Advisory only: the token is set and the engine invocation decides
    /// when to stop. A queued (still `Pending`) session is cancelled by its
    /// worker at pickup without ever invoking the engine; a `Processing`
    /// session becomes `Cancelled` only once the invocation returns having
    /// observed the token. Cancelling a terminal session is a no-op
    /// returning `InvalidState`.
    pub fn cancel(&self, session_id: &str) -> Result<()> {
        let session = self.store.get(session_id)?;
        if session.status.is_terminal() {
            return Err(SessionError::invalid_state("cancel", session.status));
        }

        let tasks = self.tasks.lock();
        match tasks.get(session_id) {
            Some(handle) => {
                handle.cancel.cancel();
                info!("Cancellation requested for session {}", session_id);
            }
            None => {
                debug!("No tracked work for session {}; nothing to signal", session_id);
            }
        }
        Ok(())
    }

    /// Number of queued or in-flight units of work
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Stop accepting work, drain the queue, and join the workers
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");
        self.queue.lock().take();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                error!("Worker task failed to join: {}", err);
            }
        }
    }
}

/// Worker task: dequeue FIFO and execute until the queue closes
async fn worker_loop(
    worker_id: usize,
    store: Arc<SessionStore>,
    engine: Arc<dyn AnalysisEngine>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkItem>>>,
    tasks: Arc<Mutex<HashMap<String, TaskHandle>>>,
) {
    debug!("Worker {} started", worker_id);
    loop {
        let item = { rx.lock().await.recv().await };
        let Some(item) = item else {
            debug!("Worker {} stopping", worker_id);
            break;
        };
        run_item(&store, &engine, &tasks, item).await;
    }
}

/// Execute a single unit of work and record its outcome
async fn run_item(
    store: &Arc<SessionStore>,
    engine: &Arc<dyn AnalysisEngine>,
    tasks: &Arc<Mutex<HashMap<String, TaskHandle>>>,
    item: WorkItem,
) {
    let WorkItem {
        session_id,
        request,
        cancel,
    } = item;

    // Cancelled while still queued: the engine is never invoked
    if cancel.is_cancelled() {
        if let Err(err) = store.update(&session_id, SessionUpdate::Cancel) {
            debug!(
                "Queued cancellation for session {} not recorded: {}",
                session_id, err
            );
        }
        tasks.lock().remove(&session_id);
        return;
    }

    if let Err(err) = store.update(&session_id, SessionUpdate::BeginProcessing) {
        // Session was cleaned up or reclaimed while queued
        debug!("Skipping stale work for session {}: {}", session_id, err);
        tasks.lock().remove(&session_id);
        return;
    }

    info!(
        "Executing {} analysis for session {}",
        request.analysis_type, session_id
    );

    let reporter = ProgressReporter::new(store.clone(), session_id.clone());
    let engine = engine.clone();
    let token = cancel.clone();
    let outcome =
        tokio::task::spawn_blocking(move || engine.execute(&request, &reporter, &token)).await;

    let update = match outcome {
        Ok(Ok(result)) => {
            info!("Analysis completed for session {}", session_id);
            SessionUpdate::Complete { result }
        }
        Ok(Err(EngineError::Cancelled)) => {
            info!("Analysis cancelled for session {}", session_id);
            SessionUpdate::Cancel
        }
        Ok(Err(err)) => {
            error!("Analysis failed for session {}: {}", session_id, err);
            SessionUpdate::Fail {
                error: ErrorInfo::from(&err),
            }
        }
        Err(join_err) => {
            error!("Analysis panicked for session {}: {}", session_id, join_err);
            SessionUpdate::Fail {
                error: ErrorInfo::new("engine_panic", join_err.to_string()),
            }
        }
    };

    if let Err(err) = store.update(&session_id, update) {
        // Session was reclaimed while the engine was still running
        warn!("Discarding outcome for session {}: {}", session_id, err);
    }
    tasks.lock().remove(&session_id);
}
