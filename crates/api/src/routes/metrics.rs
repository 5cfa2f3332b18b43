//! Prometheus recorder setup and metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Histogram buckets for aggregation runs, in seconds. The last bucket is the
/// run deadline.
const AGGREGATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

/// Installs the global Prometheus recorder and describes the service metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("aggregation_duration_seconds".to_string()),
            AGGREGATION_BUCKETS,
        )?
        .install_recorder()?;

    metrics::describe_counter!(
        "counter_events_recorded_total",
        "Increment events committed to the event log"
    );
    metrics::describe_counter!(
        "counter_record_failures_total",
        "Increment requests that failed to commit"
    );
    metrics::describe_counter!(
        "aggregation_runs_total",
        "Finished aggregation runs by outcome"
    );
    metrics::describe_counter!(
        "aggregation_requests_coalesced_total",
        "Aggregation requests folded into an already pending run"
    );
    metrics::describe_histogram!(
        "aggregation_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent in one aggregation run"
    );
    metrics::describe_gauge!(
        "aggregate_latest_counts",
        "Total computed by the most recent successful aggregation"
    );

    Ok(handle)
}

/// GET /metrics — returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
