//! Persistence sink for completed session logs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use bloomloop_tracker::TrackerLog;

use crate::error::Result;

/// Destination for tracker snapshots.
///
/// `upsert` must be idempotent on the session id: flushing the same
/// session twice replaces the earlier record instead of duplicating it.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Inserts or replaces the log for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SinkFailure` when the store rejects the write.
    async fn upsert(&self, session_id: Uuid, log: TrackerLog) -> Result<()>;
}

/// In-memory sink. Default runtime store and the test double.
#[derive(Default)]
pub struct MemorySink {
    logs: Mutex<HashMap<Uuid, TrackerLog>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored log for `session_id`, if any.
    pub async fn get(&self, session_id: Uuid) -> Option<TrackerLog> {
        self.logs.lock().await.get(&session_id).cloned()
    }

    /// Returns the number of stored logs.
    pub async fn len(&self) -> usize {
        self.logs.lock().await.len()
    }

    /// Returns `true` when no logs are stored.
    pub async fn is_empty(&self) -> bool {
        self.logs.lock().await.is_empty()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn upsert(&self, session_id: Uuid, log: TrackerLog) -> Result<()> {
        self.logs.lock().await.insert(session_id, log);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bloomloop_tracker::{LevelPolicy, ProgressTracker, Strategy};

    fn sample_log(session_id: Uuid) -> TrackerLog {
        let mut tracker =
            ProgressTracker::new(session_id, Strategy::Default, LevelPolicy::default(), None);
        tracker.set_rating(4);
        tracker.snapshot()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_session_id() {
        let sink = MemorySink::new();
        let id = Uuid::new_v4();

        sink.upsert(id, sample_log(id)).await.unwrap();
        let mut updated = sample_log(id);
        updated.rating = Some(5);
        sink.upsert(id, updated).await.unwrap();

        assert_eq!(sink.len().await, 1);
        assert_eq!(sink.get(id).await.unwrap().rating, Some(5));
    }

    #[tokio::test]
    async fn test_distinct_sessions_are_kept_apart() {
        let sink = MemorySink::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        sink.upsert(a, sample_log(a)).await.unwrap();
        sink.upsert(b, sample_log(b)).await.unwrap();

        assert_eq!(sink.len().await, 2);
        assert_eq!(sink.get(a).await.unwrap().session_id, a);
    }
}
