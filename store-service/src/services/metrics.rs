//! Prometheus metrics for store-service.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use std::time::Instant;

/// HTTP request counter by method, route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "store_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// HTTP request duration histogram by method and route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "store_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register http_request_duration")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "store_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Invoice total recomputations by outcome.
pub static RECOMPUTES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "store_invoice_recomputes_total",
        "Total number of invoice total recomputations",
        &["outcome"] // ok, invoice_missing
    )
    .expect("Failed to register invoice_recomputes_total")
});

/// Discount code attachments by outcome.
pub static DISCOUNT_ATTACHMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "store_discount_attachments_total",
        "Total number of discount code attach requests",
        &["outcome"] // attached, unchanged, detached, rejected
    )
    .expect("Failed to register discount_attachments_total")
});

/// Rendered invoice exports by format.
pub static EXPORTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "store_invoice_exports_total",
        "Total number of invoice exports by format",
        &["format"]
    )
    .expect("Failed to register invoice_exports_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "store_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&RECOMPUTES_TOTAL);
    Lazy::force(&DISCOUNT_ATTACHMENTS_TOTAL);
    Lazy::force(&EXPORTS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Records request count and latency, labelled by the matched route template
/// so invoice ids do not explode label cardinality.
pub async fn http_metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), route.as_str(), status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), route.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}
