//! Active-thread tracker: last user activity per conversation.
//!
//! Shared by the HTTP handlers (which touch and remove entries) and the idle
//! sweeper (which takes expired ones). Process-local; a restart forgets every
//! conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct ActiveThreads {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
}

impl ActiveThreads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity on a thread now.
    pub async fn touch(&self, thread_id: &str) {
        self.touch_at(thread_id, Instant::now()).await;
    }

    pub async fn touch_at(&self, thread_id: &str, at: Instant) {
        self.inner.lock().await.insert(thread_id.to_string(), at);
    }

    /// Returns true if the thread was tracked.
    pub async fn remove(&self, thread_id: &str) -> bool {
        self.inner.lock().await.remove(thread_id).is_some()
    }

    pub async fn contains(&self, thread_id: &str) -> bool {
        self.inner.lock().await.contains_key(thread_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Remove and return threads idle for longer than `timeout`.
    ///
    /// At most `max_checks` entries are inspected, least recently active
    /// first; `0` inspects all of them.
    pub async fn take_idle(&self, now: Instant, timeout: Duration, max_checks: usize) -> Vec<String> {
        let mut map = self.inner.lock().await;

        let mut entries: Vec<(&String, &Instant)> = map.iter().collect();
        entries.sort_by_key(|(_, at)| **at);

        let limit = if max_checks == 0 { entries.len() } else { max_checks };
        let expired: Vec<String> = entries
            .into_iter()
            .take(limit)
            .filter(|(_, at)| now.saturating_duration_since(**at) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            map.remove(id);
        }

        expired
    }
}
