use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "novella_cache_hit_total",
            Unit::Count,
            "Reads served from the request cache."
        );
        describe_counter!(
            "novella_cache_miss_total",
            Unit::Count,
            "Reads that started a new producer call."
        );
        describe_counter!(
            "novella_cache_join_total",
            Unit::Count,
            "Reads that joined an identical in-flight request."
        );
        describe_counter!(
            "novella_cache_expired_total",
            Unit::Count,
            "Entries evicted on read after their TTL elapsed."
        );
        describe_counter!(
            "novella_cache_producer_failure_total",
            Unit::Count,
            "Producer calls that failed; failures are never cached."
        );
        describe_counter!(
            "novella_cache_invalidated_total",
            Unit::Count,
            "Entries removed by explicit, tag or pattern invalidation."
        );
        describe_histogram!(
            "novella_backend_request_ms",
            Unit::Milliseconds,
            "Backend call latency as seen by the client, in milliseconds."
        );
    });
}
