//! Prometheus metrics handler

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .set_buckets_for_metric(
            Matcher::Full("call_duration_seconds".to_string()),
            &[5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0],
        )
        .unwrap()
        .install_recorder()
        .unwrap();

    // Describe metrics
    describe_counter!(
        "relay_sessions_total",
        "Total number of carrier media streams accepted"
    );
    describe_gauge!(
        "relay_active_sessions",
        "Number of media relay sessions currently running"
    );
    describe_counter!(
        "relay_frames_forwarded_total",
        "Audio frames forwarded between carrier and speech service"
    );
    describe_counter!(
        "relay_frames_dropped_total",
        "Frames discarded because they were malformed or unroutable"
    );
    describe_counter!(
        "relay_audio_bytes_total",
        "Decoded audio payload bytes moved through the relay"
    );
    describe_histogram!(
        "call_duration_seconds",
        "Distribution of finished call durations"
    );
    describe_gauge!(
        "hub_connected_clients",
        "Number of dashboard sockets currently connected"
    );
    describe_counter!(
        "hub_notifications_published_total",
        "Total notifications published into hub rooms"
    );
    describe_counter!(
        "tool_invocations_total",
        "Total assistant tool calls dispatched"
    );

    handle
}

/// HTTP metrics handler
pub async fn metrics_handler(
    axum::extract::State(prometheus_handle): axum::extract::State<PrometheusHandle>,
) -> Response {
    let metrics = prometheus_handle.render();
    (StatusCode::OK, metrics).into_response()
}
