//! Request metrics for the gateway.
//!
//! Cheap atomic counters exposed as JSON on the admin server. The
//! Prometheus view of the correlation path lives in `analytics-telemetry`.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Gateway request metrics
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Forecast outcomes
    pub forecasts_completed: AtomicU64,
    pub forecasts_failed: AtomicU64,
    pub forecast_timeouts: AtomicU64,

    // Latency tracking
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request
    pub fn record_request(&self, success: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a forecast that returned a response
    pub fn record_forecast_completed(&self) {
        self.forecasts_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a forecast that failed; `timed_out` also bumps the timeout count
    pub fn record_forecast_failed(&self, timed_out: bool) {
        self.forecasts_failed.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.forecast_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
            },
            "forecasts": {
                "completed": self.forecasts_completed.load(Ordering::Relaxed),
                "failed": self.forecasts_failed.load(Ordering::Relaxed),
                "timeouts": self.forecast_timeouts.load(Ordering::Relaxed),
            },
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<GatewayMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self, success: bool) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_request(success, latency_ms);
    }
}

/// Middleware counting every request and its latency.
///
/// Server errors count as failures; client errors do not.
pub async fn track_requests(
    State(metrics): State<Arc<GatewayMetrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let timer = RequestTimer::new(metrics);
    let response = next.run(req).await;
    timer.finish(!response.status().is_server_error());
    response
}
