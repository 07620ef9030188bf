//! # Request Metrics
//!
//! Two sinks are fed at once: in-process atomic counters, readable through
//! [`Server::metrics`](crate::Server::metrics) and used by tests, and the
//! global `metrics` recorder, which the binary exports in Prometheus format.
//! Without an installed recorder the `metrics` macros are no-ops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use reqgate_core::Method;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    rejection_count: Arc<AtomicU64>,
}

impl RequestMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Bodies rejected by a route validator.
    pub fn rejections(&self) -> u64 {
        self.rejection_count.load(Ordering::Relaxed)
    }

    /// Count a validator rejection on `method path`.
    pub fn record_rejection(&self, method: Method, path: &str) {
        self.rejection_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "reqgate_validation_rejections_total",
            "method" => method.as_str(),
            "path" => path.to_string()
        )
        .increment(1);
    }
}

/// Middleware that increments request and error counters.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<RequestMetrics>().cloned();

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!("reqgate_http_requests_total", "status" => status.as_u16().to_string())
        .increment(1);
    if let Some(m) = metrics {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_server_error() || status.is_client_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    response
}
