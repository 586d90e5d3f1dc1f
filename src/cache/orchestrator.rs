//! Request orchestrator.
//!
//! `RequestCache::get_or_fetch` composes the value store, the in-flight
//! tracker and the tag index in front of a caller-supplied producer:
//!
//! ```text
//! Empty --miss--> Pending --ok--> Cached(ttl) --expiry/invalidate--> Empty
//!                    \--err--> Empty
//! ```
//!
//! All three stores sit behind one mutex that is never held across an
//! `.await`, so every transition is atomic with respect to other tasks.

use std::any::type_name;
use std::collections::HashSet;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::error::FetchError;
use super::inflight::{FetchOutcome, InFlightRequest, InFlightTracker, SharedFetch};
use super::keys::{CacheKey, Tag};
use super::lock::mutex_lock;
use super::registry::TagIndex;
use super::store::{CacheStore, CachedValue};

const SOURCE: &str = "cache::orchestrator";

const METRIC_CACHE_HIT: &str = "novella_cache_hit_total";
const METRIC_CACHE_MISS: &str = "novella_cache_miss_total";
const METRIC_CACHE_JOIN: &str = "novella_cache_join_total";
const METRIC_CACHE_PRODUCER_FAILURE: &str = "novella_cache_producer_failure_total";
const METRIC_CACHE_INVALIDATED: &str = "novella_cache_invalidated_total";

/// Per-call cache behaviour.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Validity window; `None` uses [`CacheConfig::default_ttl`].
    pub ttl: Option<Duration>,
    /// Tags to attach to the stored result.
    pub tags: Vec<Tag>,
    /// Skip the store lookup. Concurrent callers are still deduplicated.
    pub bypass_cache: bool,
    /// Write a successful result to the store.
    pub store: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            tags: Vec::new(),
            bypass_cache: false,
            store: true,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// Deduplicate only; never write the result.
    pub fn no_store(mut self) -> Self {
        self.store = false;
        self
    }
}

/// Point-in-time sizes of the cache internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub tags: usize,
    pub in_flight: usize,
}

struct CacheState {
    store: CacheStore,
    inflight: InFlightTracker,
    tags: TagIndex,
    next_generation: u64,
}

impl CacheState {
    fn new() -> Self {
        Self {
            store: CacheStore::new(),
            inflight: InFlightTracker::new(),
            tags: TagIndex::new(),
            next_generation: 0,
        }
    }

    fn lookup(&mut self, key: &CacheKey, read_store: bool) -> Lookup {
        if read_store {
            match self.store.get(key) {
                Some(value) => return Lookup::Hit(value),
                None => self.tags.unregister(key),
            }
        }
        match self.inflight.get(key) {
            Some(shared) => Lookup::Join(shared),
            None => Lookup::Miss,
        }
    }

    fn remove_key(&mut self, key: &CacheKey) -> bool {
        self.tags.unregister(key);
        self.store.delete(key)
    }
}

enum Lookup {
    Hit(CachedValue),
    Join(SharedFetch),
    Miss,
}

enum Registered {
    Hit(CachedValue),
    Pending(SharedFetch),
}

/// Request cache with in-flight deduplication and tag invalidation.
///
/// Cloning yields another handle to the same cache; construct one per
/// session and hand clones to every consumer.
#[derive(Clone)]
pub struct RequestCache {
    config: CacheConfig,
    state: Arc<Mutex<CacheState>>,
}

impl RequestCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(CacheState::new())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, join an identical pending request,
    /// or run `producer` and share its result with every concurrent caller.
    ///
    /// Failures are never stored; every caller sharing the request receives
    /// the same `FetchError`.
    pub async fn get_or_fetch<V, E, F, Fut>(
        &self,
        key: CacheKey,
        producer: F,
        options: FetchOptions,
    ) -> Result<V, FetchError>
    where
        V: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let options = self.effective_options(options);

        let looked_up = {
            let mut state = mutex_lock(&self.state, SOURCE, "get_or_fetch.lookup");
            state.lookup(&key, !options.bypass_cache)
        };

        let shared = match looked_up {
            Lookup::Hit(value) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(key = %key, "Cache hit");
                return downcast(&key, value);
            }
            Lookup::Join(shared) => {
                counter!(METRIC_CACHE_JOIN).increment(1);
                debug!(key = %key, "Joined in-flight request");
                shared
            }
            Lookup::Miss => {
                // Build the producer future outside the lock; it is not polled
                // until registered, and is dropped unpolled if another caller
                // registered first.
                let pending = producer();
                match self.register(&key, pending, &options) {
                    Registered::Hit(value) => {
                        counter!(METRIC_CACHE_HIT).increment(1);
                        return downcast(&key, value);
                    }
                    Registered::Pending(shared) => shared,
                }
            }
        };

        let value = shared.await?;
        downcast(&key, value)
    }

    fn register<V, E, Fut>(
        &self,
        key: &CacheKey,
        pending: Fut,
        options: &FetchOptions,
    ) -> Registered
    where
        V: Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut state = mutex_lock(&self.state, SOURCE, "get_or_fetch.register");
        let raced = match state.lookup(key, !options.bypass_cache) {
            Lookup::Miss => None,
            Lookup::Hit(value) => Some(Registered::Hit(value)),
            Lookup::Join(shared) => Some(Registered::Pending(shared)),
        };
        if let Some(raced) = raced {
            drop(state);
            drop(pending);
            return raced;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let shared = settle_on_completion(Arc::clone(&self.state), key.clone(), generation, pending);
        let ttl = options.ttl.unwrap_or_else(|| self.config.default_ttl());
        state.inflight.register(
            key.clone(),
            InFlightRequest::new(generation, &shared, ttl, options.tags.clone(), options.store),
        );
        drop(state);

        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(key = %key, generation, "Cache miss; producer started");
        Registered::Pending(shared)
    }

    fn effective_options(&self, options: FetchOptions) -> FetchOptions {
        if self.config.enabled {
            options
        } else {
            options.bypass_cache().no_store()
        }
    }

    /// Read a live cached value without triggering a fetch.
    pub fn peek<V>(&self, key: &CacheKey) -> Option<V>
    where
        V: Clone + 'static,
    {
        let value = {
            let mut state = mutex_lock(&self.state, SOURCE, "peek");
            state.store.get(key)
        }?;
        value.downcast_ref::<V>().cloned()
    }

    /// Drop the cached value for `key`. A pending request for it still
    /// completes for its callers but is not stored.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "invalidate");
        let removed = state.remove_key(key);
        let pending = state.inflight.mark_stale(key);
        drop(state);

        if removed {
            counter!(METRIC_CACHE_INVALIDATED).increment(1);
        }
        debug!(key = %key, removed, pending, "Cache key invalidated");
        removed
    }

    /// Drop every entry carrying `tag` and return the affected keys.
    pub fn invalidate_by_tag(&self, tag: &Tag) -> HashSet<CacheKey> {
        let mut state = mutex_lock(&self.state, SOURCE, "invalidate_by_tag");
        let keys = state.tags.invalidate_by_tag(tag);
        for key in &keys {
            state.store.delete(key);
        }
        let pending = state.inflight.mark_stale_by_tag(tag);
        drop(state);

        counter!(METRIC_CACHE_INVALIDATED).increment(keys.len() as u64);
        info!(tag = %tag, removed = keys.len(), pending, "Cache tag invalidated");
        keys
    }

    /// Drop every entry whose key contains `pattern`.
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        let mut state = mutex_lock(&self.state, SOURCE, "invalidate_matching");
        let matching: Vec<CacheKey> = state
            .store
            .keys()
            .filter(|key| key.as_str().contains(pattern))
            .cloned()
            .collect();
        for key in &matching {
            state.remove_key(key);
        }
        let pending = state
            .inflight
            .mark_stale_where(|key| key.as_str().contains(pattern));
        drop(state);

        counter!(METRIC_CACHE_INVALIDATED).increment(matching.len() as u64);
        info!(pattern, removed = matching.len(), pending, "Cache keys invalidated by pattern");
        matching.len()
    }

    /// Drop every cached value and tag. Pending requests finish for their
    /// callers without being stored.
    pub fn clear(&self) {
        let mut state = mutex_lock(&self.state, SOURCE, "clear");
        state.store.clear();
        state.tags.clear();
        state.inflight.mark_all_stale();
        drop(state);

        info!("Request cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let state = mutex_lock(&self.state, SOURCE, "stats");
        CacheStats {
            entries: state.store.len(),
            tags: state.tags.tag_count(),
            in_flight: state.inflight.len(),
        }
    }
}

/// Wrap `pending` so that its settlement updates the cache exactly once,
/// however many callers await it.
fn settle_on_completion<V, E, Fut>(
    state: Arc<Mutex<CacheState>>,
    key: CacheKey,
    generation: u64,
    pending: Fut,
) -> SharedFetch
where
    V: Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    async move {
        let mut guard = SettleGuard {
            state,
            key,
            generation,
            settled: false,
        };
        let outcome: FetchOutcome = match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(value)) => Ok(Arc::new(value) as CachedValue),
            Ok(Err(error)) => Err(FetchError::producer(error)),
            Err(_panic) => Err(FetchError::Panicked {
                key: guard.key.clone(),
            }),
        };
        guard.settle(&outcome);
        outcome
    }
    .boxed()
    .shared()
}

/// Clears the in-flight entry on every exit path: success, failure, panic,
/// or the request being dropped by all of its callers.
struct SettleGuard {
    state: Arc<Mutex<CacheState>>,
    key: CacheKey,
    generation: u64,
    settled: bool,
}

impl SettleGuard {
    fn settle(&mut self, outcome: &FetchOutcome) {
        self.settled = true;
        let mut state = mutex_lock(&self.state, SOURCE, "settle");
        let Some(request) = state.inflight.finish(&self.key, self.generation) else {
            debug!(key = %self.key, generation = self.generation, "Settled request was superseded");
            return;
        };

        match outcome {
            Ok(value) if request.should_store() => {
                state.tags.unregister(&self.key);
                state
                    .store
                    .set(self.key.clone(), Arc::clone(value), request.ttl);
                for tag in request.tags {
                    state.tags.attach(tag, self.key.clone());
                }
                debug!(key = %self.key, generation = self.generation, "Producer result cached");
            }
            Ok(_) => {
                debug!(
                    key = %self.key,
                    generation = self.generation,
                    stale = request.is_stale(),
                    "Producer result returned without caching"
                );
            }
            Err(error) => {
                drop(state);
                counter!(METRIC_CACHE_PRODUCER_FAILURE).increment(1);
                debug!(key = %self.key, generation = self.generation, error = %error, "Producer failed; nothing cached");
            }
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = mutex_lock(&self.state, SOURCE, "settle.abandoned");
        if state.inflight.finish(&self.key, self.generation).is_some() {
            debug!(key = %self.key, generation = self.generation, "In-flight request abandoned");
        }
    }
}

fn downcast<V>(key: &CacheKey, value: CachedValue) -> Result<V, FetchError>
where
    V: Clone + 'static,
{
    match value.downcast_ref::<V>() {
        Some(value) => Ok(value.clone()),
        None => {
            warn!(key = %key, expected = type_name::<V>(), "Cached value type does not match request");
            Err(FetchError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<V>(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error)]
    #[error("simulated outage")]
    struct Outage;

    fn cache() -> RequestCache {
        RequestCache::new(CacheConfig::default())
    }

    #[tokio::test]
    async fn disabled_cache_only_deduplicates() {
        let cache = RequestCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let value: u32 = cache
                .get_or_fetch(
                    CacheKey::new("k"),
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Outage>(7)
                    },
                    FetchOptions::new(),
                )
                .await
                .expect("fetch succeeds");
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn no_store_returns_without_caching() {
        let cache = cache();
        let value: String = cache
            .get_or_fetch(
                CacheKey::new("translate"),
                || async { Ok::<_, Outage>("bonjour".to_string()) },
                FetchOptions::new().bypass_cache().no_store(),
            )
            .await
            .expect("fetch succeeds");

        assert_eq!(value, "bonjour");
        assert_eq!(cache.peek::<String>(&CacheKey::new("translate")), None);
    }

    #[tokio::test]
    async fn bypass_refreshes_the_stored_value() {
        let cache = cache();
        let key = CacheKey::new("k");

        let _: u32 = cache
            .get_or_fetch(key.clone(), || async { Ok::<_, Outage>(1) }, FetchOptions::new())
            .await
            .expect("first fetch");
        let refreshed: u32 = cache
            .get_or_fetch(
                key.clone(),
                || async { Ok::<_, Outage>(2) },
                FetchOptions::new().bypass_cache(),
            )
            .await
            .expect("bypassing fetch");

        assert_eq!(refreshed, 2);
        assert_eq!(cache.peek::<u32>(&key), Some(2));
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let cache = cache();
        let key = CacheKey::new("shared-key");

        let _: u32 = cache
            .get_or_fetch(key.clone(), || async { Ok::<_, Outage>(5) }, FetchOptions::new())
            .await
            .expect("first fetch");

        let error = cache
            .get_or_fetch::<String, Outage, _, _>(
                key.clone(),
                || async { Ok("never runs".to_string()) },
                FetchOptions::new(),
            )
            .await
            .expect_err("types differ");

        assert!(matches!(error, FetchError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn panicking_producer_does_not_wedge_the_key() {
        let cache = cache();
        let key = CacheKey::new("k");

        let error = cache
            .get_or_fetch::<u32, Outage, _, _>(
                key.clone(),
                || async { panic!("producer blew up") },
                FetchOptions::new(),
            )
            .await
            .expect_err("panic becomes an error");
        assert!(matches!(error, FetchError::Panicked { .. }));
        assert_eq!(cache.stats().in_flight, 0);

        let value: u32 = cache
            .get_or_fetch(key, || async { Ok::<_, Outage>(3) }, FetchOptions::new())
            .await
            .expect("retry succeeds");
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_request_is_cleared() {
        let cache = cache();
        let key = CacheKey::new("slow");

        let handle = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        key,
                        || async {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            Ok::<_, Outage>(1_u32)
                        },
                        FetchOptions::new(),
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.stats().in_flight, 1);

        handle.abort();
        let _ = handle.await;
        assert_eq!(cache.stats().in_flight, 0);

        let value: u32 = cache
            .get_or_fetch(key, || async { Ok::<_, Outage>(2) }, FetchOptions::new())
            .await
            .expect("fresh producer runs");
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn invalidate_matching_removes_by_substring() {
        let cache = cache();
        for key in ["getChapters:[\"s1\"]", "getChapters:[\"s2\"]", "getSeries:null"] {
            let _: u32 = cache
                .get_or_fetch(CacheKey::new(key), || async { Ok::<_, Outage>(0) }, FetchOptions::new())
                .await
                .expect("fetch succeeds");
        }

        assert_eq!(cache.invalidate_matching("s1"), 1);
        assert_eq!(cache.invalidate_matching("getChapters"), 1);
        assert_eq!(cache.stats().entries, 1);
    }

    #[tokio::test]
    async fn clear_drops_entries_and_tags() {
        let cache = cache();
        let _: u32 = cache
            .get_or_fetch(
                CacheKey::new("k"),
                || async { Ok::<_, Outage>(0) },
                FetchOptions::new().with_tag(Tag::series()),
            )
            .await
            .expect("fetch succeeds");
        assert_eq!(cache.stats(), CacheStats { entries: 1, tags: 1, in_flight: 0 });

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
