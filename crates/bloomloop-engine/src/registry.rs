//! In-memory session registry.
//!
//! Sessions live behind per-session locks: handlers lock one entry, so
//! mutations for a single session are serialized while distinct sessions
//! proceed concurrently. Idle sessions are swept by a periodic expiry
//! task rather than growing the map forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::session::{Chunk, SessionState};

struct SessionEntry {
    state: Arc<Mutex<SessionState>>,
    last_access: Instant,
}

/// Registry of live sessions keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session over `chunks` and returns its id.
    pub async fn create(&self, chunks: Vec<Chunk>, config: &Config) -> Uuid {
        let id = Uuid::new_v4();
        let state = SessionState::new(id, chunks, config);
        let entry = SessionEntry {
            state: Arc::new(Mutex::new(state)),
            last_access: Instant::now(),
        };
        self.sessions.lock().await.insert(id, entry);
        info!(session_id = %id, "session created");
        id
    }

    /// Looks up a session and refreshes its last-access time.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionNotFound` for unknown ids.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Mutex<SessionState>>> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or(EngineError::SessionNotFound { id })?;
        entry.last_access = Instant::now();
        Ok(Arc::clone(&entry.state))
    }

    /// Removes a session. Returns `true` if it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    /// Returns the number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns `true` when no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Drops every session idle for longer than `ttl`.
    ///
    /// Returns the number of sessions removed.
    pub async fn expire_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_access.elapsed() < ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            info!(expired, remaining = sessions.len(), "expired idle sessions");
        }
        expired
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chunks() -> Vec<Chunk> {
        vec![Chunk {
            text: "body".to_string(),
            image: None,
        }]
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let registry = SessionRegistry::new();
        let config = Config::default();

        let id = registry.create(chunks(), &config).await;
        let state = registry.get(id).await.unwrap();
        assert_eq!(state.lock().await.session_id(), id);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let err = registry.get(id).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound { id: e } if e == id));
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SessionRegistry::new();
        let config = Config::default();

        let id = registry.create(chunks(), &config).await;
        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_expiry_sweeps_only_idle_sessions() {
        let registry = SessionRegistry::new();
        let config = Config::default();

        let stale = registry.create(chunks(), &config).await;
        let fresh = registry.create(chunks(), &config).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        // Touch one session so only the other is idle past the TTL.
        registry.get(fresh).await.unwrap();

        let expired = registry.expire_idle(Duration::from_millis(20)).await;
        assert_eq!(expired, 1);
        assert!(registry.get(stale).await.is_err());
        assert!(registry.get(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_ttl_not_used_directly() {
        // A zero TTL would expire everything; the sweep task never runs
        // with one because sessionTtlSecs = 0 disables the task entirely.
        let registry = SessionRegistry::new();
        let config = Config::default();
        registry.create(chunks(), &config).await;

        let expired = registry.expire_idle(Duration::from_secs(3600)).await;
        assert_eq!(expired, 0);
    }
}
