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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "plaza_comment_cache_hit_total",
            Unit::Count,
            "Comment preview lookups served from the cache."
        );
        describe_counter!(
            "plaza_comment_cache_miss_total",
            Unit::Count,
            "Comment preview lookups that fell through to the database."
        );
        describe_counter!(
            "plaza_comment_cache_error_total",
            Unit::Count,
            "Cache backend, encode or decode failures, labelled by operation."
        );
        describe_counter!(
            "plaza_comment_cache_stale_fill_total",
            Unit::Count,
            "Cache fills discarded because the post was invalidated meanwhile."
        );
        describe_counter!(
            "plaza_comment_cache_invalidation_total",
            Unit::Count,
            "Background comment cache invalidations, labelled by result."
        );
        describe_counter!(
            "plaza_http_requests_total",
            Unit::Count,
            "HTTP responses, labelled by status class."
        );
        describe_histogram!(
            "plaza_http_request_ms",
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
