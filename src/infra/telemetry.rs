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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "kartenwerk_jobs_enqueued_total",
            Unit::Count,
            "Total number of render jobs placed on the queue."
        );
        describe_counter!(
            "kartenwerk_jobs_deduplicated_total",
            Unit::Count,
            "Total number of render requests answered by an artifact or in-flight job."
        );
        describe_counter!(
            "kartenwerk_jobs_finished_total",
            Unit::Count,
            "Total number of render jobs that produced an artifact."
        );
        describe_counter!(
            "kartenwerk_jobs_failed_total",
            Unit::Count,
            "Total number of render jobs that ended in failure."
        );
        describe_counter!(
            "kartenwerk_jobs_reaped_total",
            Unit::Count,
            "Total number of terminal jobs dropped after the retention window."
        );
        describe_gauge!(
            "kartenwerk_queue_depth",
            Unit::Count,
            "Current number of queued render jobs."
        );
        describe_histogram!(
            "kartenwerk_render_ms",
            Unit::Milliseconds,
            "Render job latency in milliseconds, including artifact write."
        );
    });
}
