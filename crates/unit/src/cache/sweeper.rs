use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::ResponseCache;

/// Background task purging expired entries of a [`ResponseCache`].
///
/// The task holds only a weak reference, so it ends on its own once the cache
/// is dropped. Dropping the sweeper aborts it.
#[derive(Debug)]
pub struct CacheSweeper {
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl ResponseCache {
    /// Starts purging expired entries every `interval`. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> CacheSweeper {
        let cache: Weak<ResponseCache> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(cache) = cache.upgrade() else {
                    debug!("response cache dropped, sweeper exits");
                    return;
                };
                cache.purge_expired();
            }
        });

        CacheSweeper { handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::CachedResponse;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_without_lookups() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(10), 16));
        let _sweeper = cache.spawn_sweeper(Duration::from_secs(1));
        cache.store("/a", CachedResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new()));

        tokio::time::sleep(Duration::from_secs(12)).await;

        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_exits_with_cache() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(10), 16));
        let sweeper = cache.spawn_sweeper(Duration::from_secs(1));

        drop(cache);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(sweeper.is_finished());
    }
}
