use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use novella::application::client::NovelClient;
use novella::cache::{CacheConfig, CacheKey, FetchOptions, RequestCache, Tag};
use novella::config::ClientSettings;
use novella::infra::memory::InMemoryNovelApi;
use serial_test::serial;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("refused")]
struct Refused;

static SNAPSHOTTER: LazyLock<Snapshotter> = LazyLock::new(|| {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    snapshotter
});

fn metric_names() -> HashSet<String> {
    SNAPSHOTTER
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect()
}

fn counter_value(name: &str) -> u64 {
    SNAPSHOTTER
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .sum()
}

#[tokio::test(start_paused = true)]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    LazyLock::force(&SNAPSHOTTER);
    let cache = RequestCache::new(CacheConfig::default());
    let short = || FetchOptions::new().with_ttl(Duration::from_millis(10));

    // miss, then hit
    for _ in 0..2 {
        cache
            .get_or_fetch(
                CacheKey::new("metrics:hit"),
                || async { Ok::<_, Refused>(1_u32) },
                short().with_tag(Tag::series()),
            )
            .await
            .expect("value");
    }

    // join
    let slow = || async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Refused>(2_u32)
    };
    let (first, second) = tokio::join!(
        cache.get_or_fetch(CacheKey::new("metrics:join"), slow, FetchOptions::new()),
        cache.get_or_fetch(CacheKey::new("metrics:join"), slow, FetchOptions::new()),
    );
    first.expect("first");
    second.expect("second");

    // producer failure
    let failed = cache
        .get_or_fetch(
            CacheKey::new("metrics:fail"),
            || async { Err::<u32, _>(Refused) },
            FetchOptions::new(),
        )
        .await;
    assert!(failed.is_err());

    // expiry and invalidation
    tokio::time::advance(Duration::from_millis(20)).await;
    assert_eq!(cache.peek::<u32>(&CacheKey::new("metrics:hit")), None);
    cache.invalidate_by_tag(&Tag::series());
    assert!(cache.invalidate(&CacheKey::new("metrics:join")));

    let names = metric_names();
    for metric in [
        "novella_cache_hit_total",
        "novella_cache_miss_total",
        "novella_cache_join_total",
        "novella_cache_expired_total",
        "novella_cache_producer_failure_total",
        "novella_cache_invalidated_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

#[tokio::test(start_paused = true)]
#[serial]
async fn backend_calls_record_latency_per_operation() {
    LazyLock::force(&SNAPSHOTTER);
    let backend = Arc::new(
        InMemoryNovelApi::seeded()
            .with_latency(Duration::from_millis(40)..Duration::from_millis(40)),
    );
    let client = NovelClient::new(
        backend,
        RequestCache::new(CacheConfig::default()),
        ClientSettings::default(),
    );
    client.series().await.expect("series");
    client.series().await.expect("cached series");

    let snapshot = SNAPSHOTTER.snapshot().into_vec();
    let latency = snapshot
        .iter()
        .find(|(composite_key, _, _, _)| {
            let key = composite_key.key();
            key.name() == "novella_backend_request_ms"
                && key
                    .labels()
                    .any(|label| label.key() == "operation" && label.value() == "get_series")
        })
        .expect("latency histogram for get_series");
    assert!(matches!(latency.3, DebugValue::Histogram(_)));
    assert!(counter_value("novella_cache_miss_total") > 0);
}
