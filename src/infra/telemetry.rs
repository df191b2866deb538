use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

/// Metric names emitted by the cache and invalidation paths.
pub const METRIC_NAMES: [&str; 8] = [
    "tenant_edge_cache_hit_total",
    "tenant_edge_cache_miss_total",
    "tenant_edge_cache_stale_served_total",
    "tenant_edge_cache_backfill_failed_total",
    "tenant_edge_origin_fetch_ms",
    "tenant_edge_origin_error_total",
    "tenant_edge_invalidation_total",
    "tenant_edge_invalidation_pending",
];

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tenant_edge_cache_hit_total",
            Unit::Count,
            "Fresh hits, labelled by the tier that answered."
        );
        describe_counter!(
            "tenant_edge_cache_miss_total",
            Unit::Count,
            "Lookups that found no fresh or revalidatable entry in either tier."
        );
        describe_counter!(
            "tenant_edge_cache_stale_served_total",
            Unit::Count,
            "Stale entries served, labelled by reason (revalidate or origin_error)."
        );
        describe_counter!(
            "tenant_edge_cache_backfill_failed_total",
            Unit::Count,
            "Regional backfills from shield hits that failed to store."
        );
        describe_histogram!(
            "tenant_edge_origin_fetch_ms",
            Unit::Milliseconds,
            "Origin fetch latency in milliseconds."
        );
        describe_counter!(
            "tenant_edge_origin_error_total",
            Unit::Count,
            "Origin fetch failures, labelled by kind."
        );
        describe_counter!(
            "tenant_edge_invalidation_total",
            Unit::Count,
            "Invalidation runs, labelled by outcome and failed stage."
        );
        describe_gauge!(
            "tenant_edge_invalidation_pending",
            Unit::Count,
            "Invalidations waiting in the ledger for a retry."
        );
    });
}
