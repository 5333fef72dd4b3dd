//! TTL-bound storage for rendered feed pages.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;

use super::config::CacheConfig;
use super::keys::FeedPageKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Cached HTTP response, replayed verbatim on a hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    stored_at: Instant,
    response: CachedResponse,
}

/// Rendered-page store. Expiry is checked on read against the caller's
/// clock; there is no background sweeper and no write-driven invalidation.
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<LruCache<FeedPageKey, Entry>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            entries: RwLock::new(LruCache::new(config.response_limit_non_zero())),
        }
    }

    /// Fresh entry for `key`, or `None` when absent or expired. Expired
    /// entries are dropped on the way out.
    pub fn get(&self, key: &FeedPageKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a freshly rendered page. The TTL window for this key restarts
    /// from `now`. Returns the key evicted to make room, if any.
    pub fn insert(
        &self,
        key: FeedPageKey,
        response: CachedResponse,
        now: Instant,
    ) -> Option<FeedPageKey> {
        rw_write(&self.entries, SOURCE, "insert")
            .push(
                key,
                Entry {
                    stored_at: now,
                    response,
                },
            )
            .and_then(|(evicted, _)| (evicted != key).then_some(evicted))
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
