//! TTL-bounded value store.
//!
//! Entries expire lazily: a read that finds a stale entry evicts it and
//! reports a miss. Nothing scans the map in the background.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;

use super::keys::CacheKey;

const METRIC_CACHE_EXPIRED: &str = "novella_cache_expired_total";

/// Type-erased cached result. One store holds every result type.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

/// Key → (value, stored_at, ttl) map.
#[derive(Default)]
pub struct CacheStore {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live value for `key`, evicting it if it has expired.
    pub fn get(&mut self, key: &CacheKey) -> Option<CachedValue> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            self.entries.remove(key);
            counter!(METRIC_CACHE_EXPIRED).increment(1);
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Store `value`, replacing any previous entry and restarting its TTL.
    pub fn set(&mut self, key: CacheKey, value: CachedValue, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove `key`. Returns whether an entry (live or stale) was present.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys currently held, stale ones included.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str) -> CachedValue {
        Arc::new(text.to_string())
    }

    fn read(store: &mut CacheStore, key: &CacheKey) -> Option<String> {
        store
            .get(key)
            .and_then(|value| value.downcast_ref::<String>().cloned())
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_live_until_ttl_elapses() {
        let mut store = CacheStore::new();
        let key = CacheKey::new("getSeries:null");
        store.set(key.clone(), value("cached"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(read(&mut store, &key).as_deref(), Some("cached"));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(read(&mut store, &key), None);
        assert!(store.is_empty(), "stale entry is evicted by the read");
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_exactly_at_ttl() {
        let mut store = CacheStore::new();
        let key = CacheKey::new("k");
        store.set(key.clone(), value("v"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(read(&mut store, &key), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_resets_timestamp() {
        let mut store = CacheStore::new();
        let key = CacheKey::new("k");
        store.set(key.clone(), value("first"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(80)).await;
        store.set(key.clone(), value("second"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(80)).await;
        assert_eq!(read(&mut store, &key).as_deref(), Some("second"));
    }

    #[test]
    fn delete_and_clear() {
        let mut store = CacheStore::new();
        store.set(CacheKey::new("a"), value("1"), Duration::from_secs(60));
        store.set(CacheKey::new("b"), value("2"), Duration::from_secs(60));

        assert!(store.delete(&CacheKey::new("a")));
        assert!(!store.delete(&CacheKey::new("a")));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }
}
