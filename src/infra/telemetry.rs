use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::render::METRIC_RENDER_MS,
    cache::{
        METRIC_CACHE_BYTES, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
        METRIC_CACHE_STALE,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Events go to stderr so `render` output on stdout stays clean.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
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
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of artifact cache hits, stale hits included."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of artifact cache misses."
        );
        describe_counter!(
            METRIC_CACHE_STALE,
            Unit::Count,
            "Total number of expired entries served once and dropped."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Total number of artifact cache evictions due to capacity."
        );
        describe_gauge!(
            METRIC_CACHE_BYTES,
            Unit::Bytes,
            "Summed byte size of all cached artifacts."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Document render latency in milliseconds, cache misses only."
        );
    });
}
