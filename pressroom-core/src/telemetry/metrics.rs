//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let buckets = [
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets(&buckets)?
        .install_recorder()?;
    Ok(handle)
}

/// Register metric descriptions and emit initial zero values so Prometheus
/// output includes HELP/TYPE lines from startup.
pub fn describe_metrics() {
    describe_counter!("pressroom_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "pressroom_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "pressroom_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "pressroom_rate_limit_throttled_total",
        "Requests rejected by the rate limiter, by endpoint class"
    );
    describe_counter!(
        "pressroom_csrf_rejected_total",
        "Requests rejected by the CSRF guard, by failed check"
    );
    describe_counter!(
        "pressroom_errors_total",
        "Errors rendered through the error redactor, by kind"
    );
    describe_counter!(
        "pressroom_view_events_dropped_total",
        "View-count events dropped because the queue was full or closed"
    );

    for class in crate::security::EndpointClass::ALL {
        counter!("pressroom_rate_limit_throttled_total", "class" => class.as_str()).absolute(0);
    }
    counter!("pressroom_csrf_rejected_total", "reason" => "token").absolute(0);
    counter!("pressroom_csrf_rejected_total", "reason" => "origin").absolute(0);
    counter!("pressroom_view_events_dropped_total").absolute(0);
    gauge!("pressroom_http_requests_in_flight").set(0.0);
}
