//! Thread-safe session registry

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use video_session_common::{AnalysisType, MediaRef, Result, SessionError};

use crate::session::{Session, SessionStatus, SessionUpdate};

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Time-to-live measured from creation; not refreshed by activity
    pub ttl: chrono::Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(24),
        }
    }
}

/// Aggregate counts over the registry
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    /// Total tracked sessions
    pub total: usize,
    /// Session count per status (lowercase status name)
    pub by_status: HashMap<String, usize>,
}

/// Concurrency-safe registry of analysis sessions
///
/// All mutations go through [`SessionStore::update`], which applies the
/// state machine under a single write lock; reads return owned snapshots so
/// callers never observe a partially-written record.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::with_capacity(64)),
            ttl: config.ttl,
        }
    }

    /// Create a new pending session and return its snapshot
    pub fn create(
        &self,
        analysis_type: AnalysisType,
        parameters: serde_json::Value,
        media: MediaRef,
    ) -> Session {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(
            id.clone(),
            analysis_type,
            parameters,
            media,
            Utc::now(),
            self.ttl,
        );
        let snapshot = session.clone();
        self.sessions.write().insert(id.clone(), session);
        info!("Created session {} for {} analysis", id, analysis_type);
        snapshot
    }

    /// Fetch a snapshot of a session
    pub fn get(&self, id: &str) -> Result<Session> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Apply a state-machine transition and return the updated snapshot
    ///
    /// The entire read-check-mutate sequence happens under the write lock,
    /// so concurrent updates to the same session serialize cleanly.
    pub fn update(&self, id: &str, update: SessionUpdate) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let previous = session.status;
        session.apply(update)?;
        session.updated_at = Utc::now();
        if session.status != previous {
            info!(
                "Session {} status changed: {} -> {}",
                id, previous, session.status
            );
        }
        Ok(session.clone())
    }

    /// Remove a session, returning the removed entry
    ///
    /// A second delete of the same id returns `NotFound`; callers treating
    /// cleanup as best-effort ignore that outcome. Removal is the
    /// exactly-once point for releasing the session's media bookkeeping.
    pub fn delete(&self, id: &str) -> Result<Session> {
        match self.sessions.write().remove(id) {
            Some(session) => {
                info!("Deleted session {}", id);
                Ok(session)
            }
            None => {
                warn!("Attempted to delete non-existent session: {}", id);
                Err(SessionError::NotFound(id.to_string()))
            }
        }
    }

    /// Ids of sessions whose reclamation deadline has passed
    ///
    /// Pure read; the janitor decides what to do with them.
    #[must_use]
    pub fn list_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.expires_at <= now)
            .map(|s| s.id.clone())
            .collect()
    }

    /// List sessions, optionally filtered by status, newest first
    #[must_use]
    pub fn list(&self, status: Option<SessionStatus>) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Aggregate counts over the registry
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let sessions = self.sessions.read();
        let mut by_status: HashMap<String, usize> = HashMap::with_capacity(6);
        for session in sessions.values() {
            *by_status.entry(session.status.as_str().to_string()).or_insert(0) += 1;
        }
        StoreStats {
            total: sessions.len(),
            by_status,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use video_session_common::ErrorInfo;

    fn store_with_ttl(ttl: chrono::Duration) -> SessionStore {
        SessionStore::new(SessionStoreConfig { ttl })
    }

    fn media() -> MediaRef {
        MediaRef::Local {
            location: "/data/video.mp4".to_string(),
        }
    }

    fn create(store: &SessionStore) -> Session {
        store.create(AnalysisType::Highlights, serde_json::json!({}), media())
    }

    #[test]
    fn test_create_then_get_is_pending() {
        let store = SessionStore::default();
        let created = create(&store);

        let fetched = store.get(&created.id).unwrap();
        assert_eq!(fetched.status, SessionStatus::Pending);
        assert_eq!(fetched.progress, 0.0);
        assert_eq!(fetched.id, created.id);
    }

    #[test]
    fn test_get_unknown_id() {
        let store = SessionStore::default();
        assert!(matches!(
            store.get("missing"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_ids_are_unique() {
        let store = SessionStore::default();
        let a = create(&store);
        let b = create(&store);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_update_rejects_terminal_session() {
        let store = SessionStore::default();
        let session = create(&store);
        store.update(&session.id, SessionUpdate::Cancel).unwrap();

        let err = store
            .update(&session.id, SessionUpdate::BeginProcessing)
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(
            store.get(&session.id).unwrap().status,
            SessionStatus::Cancelled
        );
    }

    #[test]
    fn test_completed_session_keeps_result_after_rejected_cancel() {
        let store = SessionStore::default();
        let session = create(&store);
        store
            .update(&session.id, SessionUpdate::BeginProcessing)
            .unwrap();
        store
            .update(
                &session.id,
                SessionUpdate::Complete {
                    result: serde_json::json!({"highlights": [1, 2]}),
                },
            )
            .unwrap();

        let err = store.update(&session.id, SessionUpdate::Cancel).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));

        let fetched = store.get(&session.id).unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert_eq!(fetched.result, Some(serde_json::json!({"highlights": [1, 2]})));
    }

    #[test]
    fn test_result_and_error_are_exclusive() {
        let store = SessionStore::default();

        let completed = create(&store);
        store
            .update(&completed.id, SessionUpdate::BeginProcessing)
            .unwrap();
        store
            .update(
                &completed.id,
                SessionUpdate::Complete {
                    result: serde_json::json!({"ok": true}),
                },
            )
            .unwrap();
        let fetched = store.get(&completed.id).unwrap();
        assert!(fetched.result.is_some());
        assert!(fetched.error.is_none());

        let failed = create(&store);
        store
            .update(&failed.id, SessionUpdate::BeginProcessing)
            .unwrap();
        store
            .update(
                &failed.id,
                SessionUpdate::Fail {
                    error: ErrorInfo::new("analysis_failed", "boom"),
                },
            )
            .unwrap();
        let fetched = store.get(&failed.id).unwrap();
        assert!(fetched.result.is_none());
        assert!(fetched.error.is_some());
    }

    #[test]
    fn test_delete_is_one_shot() {
        let store = SessionStore::default();
        let session = create(&store);

        assert!(store.delete(&session.id).is_ok());
        assert!(matches!(
            store.delete(&session.id),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            store.get(&session.id),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_expired_with_zero_ttl() {
        let store = store_with_ttl(chrono::Duration::zero());
        let session = create(&store);

        let expired = store.list_expired(Utc::now());
        assert_eq!(expired, vec![session.id]);
    }

    #[test]
    fn test_list_expired_ignores_live_sessions() {
        let store = SessionStore::default();
        create(&store);
        assert!(store.list_expired(Utc::now()).is_empty());
    }

    #[test]
    fn test_list_filters_by_status_newest_first() {
        let store = SessionStore::default();
        let a = create(&store);
        let b = create(&store);
        store.update(&b.id, SessionUpdate::Cancel).unwrap();

        let pending = store.list(Some(SessionStatus::Pending));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);

        let all = store.list(None);
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at >= all[1].created_at);
    }

    #[test]
    fn test_stats_counts_by_status() {
        let store = SessionStore::default();
        create(&store);
        let cancelled = create(&store);
        store.update(&cancelled.id, SessionUpdate::Cancel).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get("pending"), Some(&1));
        assert_eq!(stats.by_status.get("cancelled"), Some(&1));
    }

    #[test]
    fn test_concurrent_updates_serialize() {
        use std::sync::Arc;

        let store = Arc::new(SessionStore::default());
        let session = create(&store);
        store
            .update(&session.id, SessionUpdate::BeginProcessing)
            .unwrap();

        let mut handles = Vec::with_capacity(8);
        for i in 0..8 {
            let store = store.clone();
            let id = session.id.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..50 {
                    let _ = store.update(
                        &id,
                        SessionUpdate::Progress {
                            fraction: f64::from(i * 50 + j) / 400.0,
                            step: format!("step {i}-{j}"),
                        },
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let fetched = store.get(&session.id).unwrap();
        assert!(fetched.progress <= 1.0);
        assert!(fetched.progress >= 349.0 / 400.0);
        assert_eq!(fetched.status, SessionStatus::Processing);
    }
}
