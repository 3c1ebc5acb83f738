//! Response cache with expiry.
//!
//! Keyed by the deterministic request serialization built in the engine.
//! Entries expire after the configured lifetime; expired entries are never
//! returned, and the engine purges them lazily before each new network fetch
//! rather than on a timer. Writes are last-writer-wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::venue::Venue;

struct CacheEntry {
    venues: Arc<Vec<Venue>>,
    created: Instant,
}

/// In-memory venue-list cache.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached list for `key` if it is younger than the lifetime.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<Venue>>> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.created.elapsed() >= self.ttl {
            return None;
        }
        Some(Arc::clone(&entry.venues))
    }

    /// Stores a list under `key`, replacing any previous entry.
    pub fn insert(&self, key: String, venues: Arc<Vec<Venue>>) {
        self.entries.lock().insert(
            key,
            CacheEntry {
                venues,
                created: Instant::now(),
            },
        );
    }

    /// Drops every expired entry. Called before each new network fetch.
    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.created.elapsed() < self.ttl);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "dropped expired cache entries");
        }
    }

    /// Number of live (possibly expired, not yet purged) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venues() -> Arc<Vec<Venue>> {
        Arc::new(Vec::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_returned() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache.insert("k".to_string(), venues());
        assert!(cache.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_never_returned() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache.insert("k".to_string(), venues());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_drops_only_expired() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache.insert("old".to_string(), venues());
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.insert("young".to_string(), venues());
        tokio::time::advance(Duration::from_secs(150)).await;

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("young").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_replaces_entry_under_same_key() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache.insert("k".to_string(), venues());
        tokio::time::advance(Duration::from_secs(299)).await;
        cache.insert("k".to_string(), venues());

        // The replacement restarted the clock.
        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(cache.get("k").is_some());
        assert_eq!(cache.len(), 1);
    }
}
