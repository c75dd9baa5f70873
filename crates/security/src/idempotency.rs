//! TTL-keyed cache for replaying mutating ACP requests identified by
//! `X-Idempotency-Key`. A cached entry holds the exact response bytes so a
//! retry returns byte-identical output without re-invoking the handler.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Concurrent-safe idempotency cache with a fixed TTL per entry.
pub struct IdempotencyCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached response for `key` if present and not expired.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|e| {
            if e.expires_at > Instant::now() {
                Some(e.response.clone())
            } else {
                None
            }
        })
    }

    /// Records the response for `key`, overwriting any prior entry.
    pub async fn set(&self, key: &str, status: u16, body: Vec<u8>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                response: CachedResponse { status, body },
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let cache = IdempotencyCache::new();
        assert!(cache.get("unknown").await.is_none());
    }

    #[tokio::test]
    async fn hit_returns_cached_bytes() {
        let cache = IdempotencyCache::new();
        cache.set("key-1", 200, b"hello".to_vec()).await;
        let hit = cache.get("key-1").await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, b"hello");
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = IdempotencyCache::with_ttl(Duration::from_millis(20));
        cache.set("key-1", 200, b"hello".to_vec()).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("key-1").await.is_none());
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let cache = IdempotencyCache::new();
        cache.set("a", 200, b"a-body".to_vec()).await;
        cache.set("b", 202, b"b-body".to_vec()).await;
        assert_eq!(cache.get("a").await.unwrap().body, b"a-body");
        assert_eq!(cache.get("b").await.unwrap().status, 202);
    }
}
