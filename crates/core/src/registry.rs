//! The session registry: a shared map from session id to live [`Session`],
//! with capacity enforcement and TTL-driven eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::session::{Session, SessionMetadata};

/// Shared, cloneable handle to the set of live sessions.
///
/// Cloning a `Registry` clones the `Arc` around the map, not the map
/// itself — every clone observes the same sessions.
#[derive(Clone)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    max_sessions: usize,
    handshake_timeout: Duration,
    turn_timeout: Duration,
}

impl Registry {
    pub fn new(max_sessions: usize, handshake_timeout: Duration, turn_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
            handshake_timeout,
            turn_timeout,
        }
    }

    /// Look up `id`, creating it fresh if it does not already exist.
    ///
    /// Returns [`Error::CapacityExceeded`] if the registry is already at
    /// `max_sessions` and `id` names a session that does not yet exist;
    /// an existing session is always returned regardless of capacity, so
    /// a full registry never breaks an in-progress rendezvous.
    pub async fn get_or_create(&self, id: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(Arc::clone(session));
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return Ok(Arc::clone(session));
        }
        if sessions.len() >= self.max_sessions {
            return Err(Error::CapacityExceeded);
        }

        let session = Session::new(
            id.to_string(),
            self.handshake_timeout,
            self.turn_timeout,
        );
        sessions.insert(id.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Remove and close `id`, if present. Idempotent: closing a session
    /// that does not exist (or was already closed) is a no-op.
    pub async fn close(&self, id: &str) {
        let session = self.sessions.write().await.remove(id);
        if let Some(session) = session {
            session.close().await;
        }
    }

    /// Number of currently-registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Metadata for every currently-registered session, for `/admin/sessions`.
    pub async fn list(&self) -> Vec<SessionMetadata> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions {
            out.push(session.metadata().await);
        }
        out
    }

    /// Evict every session whose last activity is older than `ttl`,
    /// closing each one so any suspended waiter observes [`Error::Closed`]
    /// instead of hanging until its own turn timeout.
    ///
    /// Returns the number of sessions evicted.
    pub async fn cleanup_expired(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);

        // Snapshot the session table under the read lock only long enough
        // to clone the Arcs; the per-session activity probes below run
        // with no lock held at all.
        let candidates: Vec<(String, Arc<Session>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(id, session)| (id.clone(), Arc::clone(session)))
                .collect()
        };

        let mut expired = Vec::with_capacity(candidates.len());
        for (id, session) in candidates {
            if session.last_activity_at().await < cutoff {
                expired.push((id, session));
            }
        }

        if expired.is_empty() {
            return 0;
        }

        // Re-confirm staleness right before removal: a session can receive
        // a fresh request (bumping its activity) in the gap between the
        // unlocked probe above and acquiring the write lock here, and that
        // request must not be evicted out from under it.
        let mut evicted = Vec::with_capacity(expired.len());
        {
            let mut sessions = self.sessions.write().await;
            for (id, session) in expired {
                if session.last_activity_at().await >= cutoff {
                    continue;
                }
                sessions.remove(&id);
                evicted.push(session);
            }
        }

        for session in &evicted {
            session.close().await;
        }

        evicted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(max: usize) -> Registry {
        Registry::new(max, Duration::from_millis(200), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_session() {
        let registry = registry(10);
        let a = registry.get_or_create("s1").await.unwrap();
        let b = registry.get_or_create("s1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn capacity_exceeded_rejects_new_sessions_only() {
        let registry = registry(1);
        registry.get_or_create("s1").await.unwrap();

        let err = registry.get_or_create("s2").await.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded));

        // the existing session is still reachable even at capacity.
        assert!(registry.get_or_create("s1").await.is_ok());
    }

    #[tokio::test]
    async fn close_removes_and_completes_waiters() {
        let registry = registry(10);
        let session = registry.get_or_create("s1").await.unwrap();
        let waiting = tokio::spawn(async move { session.process_request("ping".into(), None).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.close("s1").await;

        assert_eq!(registry.count().await, 0);
        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn cleanup_expired_evicts_stale_sessions() {
        let registry = registry(10);
        registry.get_or_create("stale").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.get_or_create("fresh").await.unwrap();

        let evicted = registry.cleanup_expired(Duration::from_millis(25)).await;

        assert_eq!(evicted, 1);
        assert_eq!(registry.count().await, 1);
    }
}
