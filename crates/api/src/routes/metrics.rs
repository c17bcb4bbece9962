//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the metrics recorded by the purchase workflow.
pub fn describe() {
    metrics::describe_counter!("checkouts_total", "Checkouts attempted");
    metrics::describe_counter!("checkouts_failed", "Checkouts rolled back");
    metrics::describe_counter!("purchases_cancelled", "Purchases cancelled by customers");
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        Unit::Seconds,
        "Time spent in committed checkouts"
    );
}

/// GET /metrics: returns Prometheus-formatted metrics.
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
