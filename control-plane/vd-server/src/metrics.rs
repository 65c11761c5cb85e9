//! Prometheus series exported on `/metrics`. The metric names are part of
//! the external contract and must not change.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, HistogramVec, histogram_opts, opts, register_counter_vec, register_gauge,
    register_histogram_vec,
};

lazy_static! {
    pub static ref CLUSTERS_CONNECTED: Gauge = register_gauge!(opts!(
        "velero_dashboard_clusters_connected",
        "Number of currently connected clusters"
    ))
    .expect("register clusters_connected");
    pub static ref CLUSTERS_TOTAL: Gauge = register_gauge!(opts!(
        "velero_dashboard_clusters_total",
        "Total number of configured clusters"
    ))
    .expect("register clusters_total");
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        opts!("velero_dashboard_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"]
    )
    .expect("register http_requests_total");
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        histogram_opts!(
            "velero_dashboard_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ),
        &["method", "path"]
    )
    .expect("register http_request_duration");
    pub static ref WEBSOCKET_CLIENTS: Gauge = register_gauge!(opts!(
        "velero_dashboard_websocket_clients",
        "Number of active WebSocket connections"
    ))
    .expect("register websocket_clients");
    pub static ref BACKUP_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        opts!(
            "velero_dashboard_backup_events_total",
            "Total backup events observed via watchers"
        ),
        &["cluster", "action"]
    )
    .expect("register backup_events_total");
    pub static ref HEALTH_CHECK_FAILURES: CounterVec = register_counter_vec!(
        opts!(
            "velero_dashboard_health_check_failures_total",
            "Total cluster health check failures"
        ),
        &["cluster"]
    )
    .expect("register health_check_failures");
    pub static ref WEBHOOK_DELIVERIES_TOTAL: CounterVec = register_counter_vec!(
        opts!(
            "velero_dashboard_webhook_deliveries_total",
            "Total webhook delivery attempts"
        ),
        &["type", "status"]
    )
    .expect("register webhook_deliveries_total");
    pub static ref WEBHOOK_DELIVERY_DURATION: HistogramVec = register_histogram_vec!(
        histogram_opts!(
            "velero_dashboard_webhook_delivery_duration_seconds",
            "Webhook delivery duration in seconds"
        ),
        &["type"]
    )
    .expect("register webhook_delivery_duration");
}

/// Forces every series into the default registry so gauges show up in the
/// exposition before their first update.
pub fn register_metrics() {
    lazy_static::initialize(&CLUSTERS_CONNECTED);
    lazy_static::initialize(&CLUSTERS_TOTAL);
    lazy_static::initialize(&HTTP_REQUESTS_TOTAL);
    lazy_static::initialize(&HTTP_REQUEST_DURATION);
    lazy_static::initialize(&WEBSOCKET_CLIENTS);
    lazy_static::initialize(&BACKUP_EVENTS_TOTAL);
    lazy_static::initialize(&HEALTH_CHECK_FAILURES);
    lazy_static::initialize(&WEBHOOK_DELIVERIES_TOTAL);
    lazy_static::initialize(&WEBHOOK_DELIVERY_DURATION);
}

/// Text exposition of the default registry.
pub async fn metrics_handler() -> impl IntoResponse {
    use prometheus::TextEncoder;

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(output) => (StatusCode::OK, output).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}
