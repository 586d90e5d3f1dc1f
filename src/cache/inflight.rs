//! In-flight request tracker.
//!
//! Collapses concurrent requests for one key into a single producer call.
//! The tracker only holds a weak handle to each shared future: callers own
//! the request, and if all of them walk away the producer is dropped and its
//! entry disappears with it.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::{BoxFuture, Shared, WeakShared};

use super::error::FetchError;
use super::keys::{CacheKey, Tag};
use super::store::CachedValue;

/// What every caller sharing a request eventually receives.
pub type FetchOutcome = Result<CachedValue, FetchError>;

/// The single future all callers for one key await.
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// A pending producer call and how to store its result.
pub struct InFlightRequest {
    pub generation: u64,
    pub ttl: Duration,
    pub tags: Vec<Tag>,
    pub store: bool,
    stale: bool,
    future: Option<WeakShared<BoxFuture<'static, FetchOutcome>>>,
}

impl InFlightRequest {
    pub fn new(
        generation: u64,
        future: &SharedFetch,
        ttl: Duration,
        tags: Vec<Tag>,
        store: bool,
    ) -> Self {
        Self {
            generation,
            ttl,
            tags,
            store,
            stale: false,
            future: future.downgrade(),
        }
    }

    /// Invalidated while pending: the result goes to waiters but not to the store.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Whether the settled result should be written to the store.
    pub fn should_store(&self) -> bool {
        self.store && !self.stale
    }

    fn upgrade(&self) -> Option<SharedFetch> {
        self.future.as_ref()?.upgrade()
    }
}

/// Key → pending request. At most one entry per key.
#[derive(Default)]
pub struct InFlightTracker {
    pending: HashMap<CacheKey, InFlightRequest>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a live request is registered for `key`.
    pub fn has(&self, key: &CacheKey) -> bool {
        self.pending
            .get(key)
            .is_some_and(|request| request.upgrade().is_some())
    }

    /// The shared future for `key`, if a live request exists.
    pub fn get(&self, key: &CacheKey) -> Option<SharedFetch> {
        self.pending.get(key)?.upgrade()
    }

    /// Register `request` under `key`, replacing a dead entry if one lingers.
    pub fn register(&mut self, key: CacheKey, request: InFlightRequest) {
        self.pending.insert(key, request);
    }

    /// Remove the entry for `key` regardless of generation.
    pub fn clear(&mut self, key: &CacheKey) -> Option<InFlightRequest> {
        self.pending.remove(key)
    }

    /// Remove the entry for `key` only if it is still `generation`.
    pub fn finish(&mut self, key: &CacheKey, generation: u64) -> Option<InFlightRequest> {
        match self.pending.get(key) {
            Some(request) if request.generation == generation => self.pending.remove(key),
            _ => None,
        }
    }

    pub fn mark_stale(&mut self, key: &CacheKey) -> bool {
        match self.pending.get_mut(key) {
            Some(request) => {
                request.stale = true;
                true
            }
            None => false,
        }
    }

    /// Mark every pending request tagged with `tag`. Returns how many were marked.
    pub fn mark_stale_by_tag(&mut self, tag: &Tag) -> usize {
        let mut marked = 0;
        for request in self.pending.values_mut() {
            if request.tags.contains(tag) {
                request.stale = true;
                marked += 1;
            }
        }
        marked
    }

    /// Mark every pending request whose key satisfies `predicate`.
    pub fn mark_stale_where(&mut self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let mut marked = 0;
        for (key, request) in &mut self.pending {
            if predicate(key) {
                request.stale = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn mark_all_stale(&mut self) {
        for request in self.pending.values_mut() {
            request.stale = true;
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::FutureExt;

    use super::*;

    fn ready_fetch(text: &'static str) -> SharedFetch {
        async move { Ok::<CachedValue, FetchError>(Arc::new(text.to_string())) }
            .boxed()
            .shared()
    }

    fn request(generation: u64, future: &SharedFetch, tags: Vec<Tag>) -> InFlightRequest {
        InFlightRequest::new(generation, future, Duration::from_secs(60), tags, true)
    }

    #[tokio::test]
    async fn registered_future_is_shared() {
        let mut tracker = InFlightTracker::new();
        let key = CacheKey::new("k");
        let future = ready_fetch("value");

        tracker.register(key.clone(), request(1, &future, Vec::new()));
        assert!(tracker.has(&key));

        let joined = tracker.get(&key).expect("live request");
        let value = joined.await.expect("producer succeeds");
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("value"));
    }

    #[test]
    fn dropped_future_is_not_joinable() {
        let mut tracker = InFlightTracker::new();
        let key = CacheKey::new("k");
        let future = ready_fetch("value");

        tracker.register(key.clone(), request(1, &future, Vec::new()));
        drop(future);

        assert!(!tracker.has(&key));
        assert!(tracker.get(&key).is_none());
    }

    #[test]
    fn finish_respects_generation() {
        let mut tracker = InFlightTracker::new();
        let key = CacheKey::new("k");
        let future = ready_fetch("value");

        tracker.register(key.clone(), request(2, &future, Vec::new()));

        assert!(tracker.finish(&key, 1).is_none());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.finish(&key, 2).is_some());
        assert!(tracker.is_empty());
    }

    #[test]
    fn stale_marking_by_tag() {
        let mut tracker = InFlightTracker::new();
        let future = ready_fetch("value");

        tracker.register(
            CacheKey::new("glossary"),
            request(1, &future, vec![Tag::glossary()]),
        );
        tracker.register(
            CacheKey::new("series"),
            request(2, &future, vec![Tag::series()]),
        );

        assert_eq!(tracker.mark_stale_by_tag(&Tag::glossary()), 1);

        let glossary = tracker.clear(&CacheKey::new("glossary")).expect("entry");
        assert!(glossary.is_stale());
        assert!(!glossary.should_store());

        let series = tracker.clear(&CacheKey::new("series")).expect("entry");
        assert!(series.should_store());
    }
}
