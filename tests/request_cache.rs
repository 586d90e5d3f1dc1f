//! Behavioural tests for `RequestCache`: deduplication, expiry, failure
//! handling and tag invalidation, driven on a paused tokio clock.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use novella::application::api::NovelApi;
use novella::application::error::ApiError;
use novella::cache::{CacheConfig, CacheKey, FetchError, FetchOptions, RequestCache, Tag};
use novella::domain::entities::{GlossaryTerm, NewGlossaryTerm, TermCategory};
use novella::infra::memory::InMemoryNovelApi;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("backend unavailable")]
struct Outage;

fn cache() -> RequestCache {
    RequestCache::new(CacheConfig::default())
}

/// A producer body that counts its invocations and settles after `delay`.
fn counted<V>(
    calls: &Arc<AtomicUsize>,
    delay: Duration,
    result: Result<V, Outage>,
) -> impl Future<Output = Result<V, Outage>> + Send + 'static
where
    V: Send + 'static,
{
    let calls = Arc::clone(calls);
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        result
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_producer_call() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("getSeries:[]");

    let callers = (0..8).map(|_| {
        cache.get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::from_millis(20), Ok(vec![1_u32, 2, 3])),
            FetchOptions::new(),
        )
    });
    let results = join_all(callers).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.expect("shared value"), vec![1, 2, 3]);
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_failure() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("getChapters:[null]");

    let callers = (0..3).map(|_| {
        cache.get_or_fetch(
            key.clone(),
            || counted::<Vec<u32>>(&calls, Duration::from_millis(5), Err(Outage)),
            FetchOptions::new(),
        )
    });
    let errors: Vec<FetchError> = join_all(callers)
        .await
        .into_iter()
        .map(|result| result.expect_err("producer fails"))
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(errors[0].downcast_producer::<Outage>().is_some());
    assert!(errors.iter().all(|error| error.same_failure(&errors[0])));
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_their_ttl() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("k");
    let options = || FetchOptions::new().with_ttl(Duration::from_millis(100));

    let first: String = cache
        .get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::ZERO, Ok("v1".to_string())),
            options(),
        )
        .await
        .expect("first fetch");
    assert_eq!(first, "v1");

    tokio::time::advance(Duration::from_millis(50)).await;
    let fresh: String = cache
        .get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::ZERO, Ok("v2".to_string())),
            options(),
        )
        .await
        .expect("cached read");
    assert_eq!(fresh, "v1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(cache.peek::<String>(&key), None);
    let refetched: String = cache
        .get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::ZERO, Ok("v2".to_string())),
            options(),
        )
        .await
        .expect("refetch");
    assert_eq!(refetched, "v2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failures_are_never_cached() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("k");

    let failed = cache
        .get_or_fetch(
            key.clone(),
            || counted::<u32>(&calls, Duration::ZERO, Err(Outage)),
            FetchOptions::new(),
        )
        .await;
    assert!(failed.is_err());

    let recovered = cache
        .get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::ZERO, Ok(7_u32)),
            FetchOptions::new(),
        )
        .await;
    assert_eq!(recovered.expect("second producer runs"), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn tag_invalidation_only_touches_tagged_keys() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let tagged = |name: &str, tag: Tag| {
        let key = CacheKey::new(name);
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        let value = name.to_string();
        async move {
            cache
                .get_or_fetch(
                    key,
                    || counted(&calls, Duration::ZERO, Ok(value)),
                    FetchOptions::new().with_tag(tag),
                )
                .await
                .expect("fetch")
        }
    };

    tagged("a", Tag::new("T")).await;
    tagged("b", Tag::new("T")).await;
    tagged("c", Tag::new("U")).await;

    let removed = cache.invalidate_by_tag(&Tag::new("T"));

    assert_eq!(removed.len(), 2);
    assert!(removed.contains(&CacheKey::new("a")));
    assert!(removed.contains(&CacheKey::new("b")));
    assert_eq!(cache.peek::<String>(&CacheKey::new("a")), None);
    assert_eq!(cache.peek::<String>(&CacheKey::new("b")), None);
    assert_eq!(cache.peek::<String>(&CacheKey::new("c")).as_deref(), Some("c"));
}

#[tokio::test(start_paused = true)]
async fn completed_reads_are_served_without_a_producer() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("k");
    let options = || FetchOptions::new().with_ttl(Duration::from_secs(300));

    cache
        .get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::from_millis(10), Ok(1_u8)),
            options(),
        )
        .await
        .expect("first");
    let second = cache
        .get_or_fetch(
            key.clone(),
            || -> std::future::Ready<Result<u8, Outage>> {
                panic!("a cached read must not invoke its producer")
            },
            options(),
        )
        .await;

    assert_eq!(second.expect("cached"), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn glossary_reads_refetch_after_a_new_term() {
    let backend = Arc::new(InMemoryNovelApi::seeded().with_latency(
        Duration::from_millis(50)..Duration::from_millis(50),
    ));
    let cache = cache();
    let key = CacheKey::new("getGlossaryTerms:seriesA");
    let options = || {
        FetchOptions::new()
            .with_ttl(Duration::from_millis(120_000))
            .with_tag(Tag::glossary())
    };
    let fetch_terms = || {
        let backend = Arc::clone(&backend);
        async move {
            backend
                .get_glossary_terms(Some("s1"), None)
                .await?
                .into_result("get_glossary_terms")
        }
    };

    let (first, second): (Result<Vec<GlossaryTerm>, _>, Result<Vec<GlossaryTerm>, _>) = tokio::join!(
        cache.get_or_fetch(key.clone(), fetch_terms, options()),
        cache.get_or_fetch(key.clone(), fetch_terms, options()),
    );
    let first = first.expect("first caller");
    assert_eq!(first, second.expect("second caller"));
    assert_eq!(backend.calls("get_glossary_terms"), 1);

    backend
        .create_glossary_term(&NewGlossaryTerm {
            term: "Boundary Beast".into(),
            definition: String::new(),
            translation: "Bestia Fronteriza".into(),
            category: TermCategory::Character,
            is_user_defined: true,
            series_id: "s1".into(),
            chapter_id: None,
            chapter_ids: None,
        })
        .await
        .expect("create term");
    cache.invalidate_by_tag(&Tag::glossary());

    let third: Vec<GlossaryTerm> = cache
        .get_or_fetch(key.clone(), fetch_terms, options())
        .await
        .expect("third caller");
    assert_eq!(backend.calls("get_glossary_terms"), 2);
    assert_eq!(third.len(), first.len() + 1);
}

#[tokio::test(start_paused = true)]
async fn invalidation_while_pending_skips_the_store() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("glossary:s1");

    let pending = {
        let cache = cache.clone();
        let key = key.clone();
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            cache
                .get_or_fetch(
                    key,
                    || counted(&calls, Duration::from_millis(100), Ok("old".to_string())),
                    FetchOptions::new().with_tag(Tag::glossary()),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cache.stats().in_flight, 1);

    cache.invalidate_by_tag(&Tag::glossary());
    let settled = pending.await.expect("task").expect("value");

    assert_eq!(settled, "old");
    assert_eq!(cache.peek::<String>(&key), None);
    assert_eq!(cache.stats().in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn abandoned_request_does_not_wedge_the_key() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("slow");

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        cache.get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::from_secs(60), Ok(1_u32)),
            FetchOptions::new(),
        ),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(cache.stats().in_flight, 0);

    let value = cache
        .get_or_fetch(
            key,
            || counted(&calls, Duration::ZERO, Ok(2_u32)),
            FetchOptions::new(),
        )
        .await
        .expect("fresh producer");
    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn reusing_a_key_for_another_type_is_reported() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("shared");

    cache
        .get_or_fetch(
            key.clone(),
            || counted(&calls, Duration::ZERO, Ok(vec!["a".to_string()])),
            FetchOptions::new(),
        )
        .await
        .expect("strings");

    let mismatch = cache
        .get_or_fetch(
            key,
            || counted(&calls, Duration::ZERO, Ok(3_u64)),
            FetchOptions::new(),
        )
        .await;
    assert!(matches!(mismatch, Err(FetchError::TypeMismatch { .. })));
}

#[tokio::test(start_paused = true)]
async fn rejected_envelopes_fail_every_waiter() {
    let backend = Arc::new(
        InMemoryNovelApi::seeded().with_latency(Duration::from_millis(10)..Duration::from_millis(10)),
    );
    backend.reject_next(1);
    let cache = cache();
    let key = CacheKey::new("getSeries:[]");
    let fetch = || {
        let backend = Arc::clone(&backend);
        async move { backend.get_series().await?.into_result("get_series") }
    };

    let (first, second) = tokio::join!(
        cache.get_or_fetch(key.clone(), fetch, FetchOptions::new()),
        cache.get_or_fetch(key.clone(), fetch, FetchOptions::new()),
    );
    for outcome in [first, second] {
        let error = ApiError::from(outcome.expect_err("rejected"));
        assert!(error.is_rejection());
    }
    assert_eq!(backend.calls("get_series"), 1);
    assert_eq!(cache.stats().entries, 0);
}
