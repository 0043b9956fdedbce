use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};
use triomphe::Arc;

use crate::config::CacheConfig;
use crate::response::CachedResponse;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    response: Arc<CachedResponse>,
    expires_at: Instant,
}

impl CacheEntry {
    pub fn new(response: Arc<CachedResponse>, expires_at: Instant) -> Self {
        Self { response, expires_at }
    }

    #[inline]
    pub fn response(&self) -> &Arc<CachedResponse> {
        &self.response
    }

    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[inline]
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent map of path to cached response with lazy expiry.
///
/// Concurrent `set` calls for one key are last-writer-wins.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { entries: DashMap::new(), ttl, max_entries: max_entries.max(1) }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    /// Returns the entry for `key` if it is still fresh, evicting it otherwise.
    pub fn get(&self, key: &str) -> Option<Arc<CachedResponse>> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_fresh(now) {
                return Some(Arc::clone(&entry.response));
            }
        }

        // a concurrent set may have replaced the stale entry already
        if self.entries.remove_if(key, |_, entry| !entry.is_fresh(now)).is_some() {
            trace!(key, "evicted expired cache entry");
        }
        None
    }

    /// Stores `entry` under `key`, replacing whatever was there.
    pub fn set(&self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.make_room();
        }
        self.entries.insert(key, entry);
    }

    /// Stores `response` under `key` for one freshness window from now.
    pub fn store(&self, key: impl Into<String>, response: CachedResponse) {
        let entry = CacheEntry::new(Arc::new(response), Instant::now() + self.ttl);
        self.set(key, entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let fresh = entry.is_fresh(now);
            if !fresh {
                purged += 1;
            }
            fresh
        });

        if purged > 0 {
            debug!(purged, remaining = self.entries.len(), "purged expired cache entries");
        }
        purged
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[inline]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn make_room(&self) {
        self.purge_expired();
        if self.entries.len() < self.max_entries {
            return;
        }

        // every entry shares the same ttl, so the one closest to expiry is the oldest
        let oldest = self.entries.iter().min_by_key(|entry| entry.expires_at).map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!(key = %key, max_entries = self.max_entries, "cache full, evicted oldest entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    const TTL: Duration = Duration::from_secs(300);

    fn response(body: &'static str) -> CachedResponse {
        CachedResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_served_until_expiry() {
        let cache = ResponseCache::new(TTL, 16);
        cache.store("/hello", response("hi"));

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert_eq!(cache.get("/hello").unwrap().body(), &Bytes::from_static(b"hi"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("/hello").is_none());
        assert!(cache.is_empty());

        // not resurrected
        assert!(cache.get("/hello").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_restarts_window() {
        let cache = ResponseCache::new(TTL, 16);
        cache.store("/a", response("one"));

        tokio::time::advance(Duration::from_secs(200)).await;
        cache.store("/a", response("two"));
        tokio::time::advance(Duration::from_secs(200)).await;

        assert_eq!(cache.get("/a").unwrap().body(), &Bytes::from_static(b"two"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_accepts_explicit_expiry() {
        let cache = ResponseCache::new(TTL, 16);
        let expires_at = Instant::now() + Duration::from_secs(5);
        cache.set("/short", CacheEntry::new(Arc::new(response("x")), expires_at));

        assert!(cache.get("/short").is_some());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.get("/short").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest() {
        let cache = ResponseCache::new(TTL, 2);
        cache.store("/a", response("a"));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.store("/b", response("b"));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.store("/c", response("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("/a").is_none());
        assert!(cache.get("/b").is_some());
        assert!(cache.get("/c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_prefers_purging_expired() {
        let cache = ResponseCache::new(Duration::from_secs(10), 2);
        cache.store("/old", response("old"));
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.store("/young", response("young"));
        tokio::time::advance(Duration::from_secs(6)).await;

        cache.store("/new", response("new"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("/young").is_some());
        assert!(cache.get("/new").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_in_full_cache_keeps_others() {
        let cache = ResponseCache::new(TTL, 2);
        cache.store("/a", response("a"));
        cache.store("/b", response("b"));
        cache.store("/a", response("a2"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("/b").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_counts_removed_entries() {
        let cache = ResponseCache::new(Duration::from_secs(10), 16);
        cache.store("/a", response("a"));
        cache.store("/b", response("b"));
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.store("/c", response("c"));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
    }
}
