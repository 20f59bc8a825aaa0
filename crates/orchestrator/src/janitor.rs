//! Periodic reclamation of expired sessions

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use video_session_store::{SessionStore, SessionUpdate};

use crate::orchestrator::TaskOrchestrator;

/// Janitor configuration
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// How long a sweep waits for a cancelled session to reach a terminal
    /// status before marking it expired
    pub grace: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            grace: Duration::from_secs(2),
        }
    }
}

/// Sweeps the store for sessions past their TTL and reclaims them
///
/// Reclamation is cancel-then-reap: a non-terminal expired session first
/// gets a cooperative cancellation request; if it reaches a terminal status
/// within the grace period it is deleted as-is (usually `Cancelled`),
/// otherwise it is marked `Expired` and deleted anyway. An engine
/// invocation that ignores its token may keep running with no session
/// record left; cooperative cancellation cannot force it to stop.
pub struct Janitor {
    store: Arc<SessionStore>,
    orchestrator: Arc<TaskOrchestrator>,
    config: JanitorConfig,
}

/// Handle to a running janitor task
pub struct JanitorHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the sweep loop and wait for it to exit
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

impl Janitor {
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        orchestrator: Arc<TaskOrchestrator>,
        config: JanitorConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    /// Spawn the periodic sweep loop
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> JanitorHandle {
        let token = CancellationToken::new();
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            info!(
                "Janitor started (interval {:?}, grace {:?})",
                self.config.interval, self.config.grace
            );
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval's first tick completes immediately; consume it so
            // sweeps start one full interval after spawn
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep(Utc::now()).await;
                    }
                }
            }
            debug!("Janitor stopped");
        });
        JanitorHandle { token, handle }
    }

    /// Reclaim every session expired as of `now`; returns the count removed
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let expired = self.store.list_expired(now);
        if expired.is_empty() {
            return 0;
        }
        debug!("Janitor sweep found {} expired sessions", expired.len());

        let mut reclaimed = 0;
        for id in expired {
            let Ok(session) = self.store.get(&id) else {
                // Cleaned up concurrently
                continue;
            };

            if !session.status.is_terminal() {
                if let Err(err) = self.orchestrator.cancel(&id) {
                    debug!("Janitor cancel for session {} not applied: {}", id, err);
                }
                self.wait_for_terminal(&id).await;

                if let Ok(current) = self.store.get(&id) {
                    if !current.status.is_terminal() {
                        if let Err(err) = self.store.update(&id, SessionUpdate::Expire) {
                            warn!("Could not expire session {}: {}", id, err);
                        }
                    }
                }
            }

            match self.store.delete(&id) {
                Ok(removed) => {
                    info!(
                        "Reclaimed expired session {} ({}); released media reference {}",
                        id,
                        removed.status,
                        removed.media.location()
                    );
                    reclaimed += 1;
                }
                Err(_) => {
                    // Cleaned up concurrently between get and delete
                }
            }
        }

        if reclaimed > 0 {
            info!("Janitor reclaimed {} expired sessions", reclaimed);
        }
        reclaimed
    }

    /// Poll until the session is terminal (or gone), up to the grace period
    async fn wait_for_terminal(&self, id: &str) {
        let deadline = tokio::time::Instant::now() + self.config.grace;
        loop {
            match self.store.get(id) {
                Ok(session) if session.status.is_terminal() => return,
                Err(_) => return,
                Ok(_) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
