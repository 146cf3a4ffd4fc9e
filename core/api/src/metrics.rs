//! Request metrics and the Prometheus exposition endpoint.

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Instant;

static REQUEST_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mirror_rosetta_request_total",
        "Number of requests served, by endpoint and status code",
        &["endpoint", "status"]
    )
    .expect("metric registration")
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "mirror_rosetta_request_duration_seconds",
        "Request latency, by endpoint",
        &["endpoint"]
    )
    .expect("metric registration")
});

/// Axum middleware recording a counter and latency histogram per endpoint.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let endpoint = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    REQUEST_DURATION
        .with_label_values(&[&endpoint])
        .observe(started.elapsed().as_secs_f64());
    REQUEST_COUNT
        .with_label_values(&[&endpoint, response.status().as_str()])
        .inc();

    response
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([("content-type", encoder.format_type().to_string())], buffer).into_response()
}
