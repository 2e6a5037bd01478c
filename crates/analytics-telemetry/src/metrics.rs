//! Prometheus metrics for the forecast correlation path.
//!
//! All metrics follow the naming convention: `analytics_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., pending_registered_total)
//! - **Gauge**: Value that can go up or down (e.g., pending_requests)
//! - **Histogram**: Distribution of values (e.g., forecast_wait_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CORRELATION TABLE
    // =========================================================================

    /// Pending requests registered
    pub static ref PENDING_REGISTERED: Counter = Counter::new(
        "analytics_pending_registered_total",
        "Total pending forecast requests registered"
    ).expect("metric creation failed");

    /// Pending requests resolved by a response
    pub static ref PENDING_RESOLVED: Counter = Counter::new(
        "analytics_pending_resolved_total",
        "Total pending forecast requests resolved by a response"
    ).expect("metric creation failed");

    /// Waits that hit their deadline
    pub static ref PENDING_TIMEOUTS: Counter = Counter::new(
        "analytics_pending_timeouts_total",
        "Total forecast waits that timed out"
    ).expect("metric creation failed");

    /// Current number of pending requests
    pub static ref PENDING_REQUESTS: Gauge = Gauge::new(
        "analytics_pending_requests",
        "Number of forecast requests currently awaiting a response"
    ).expect("metric creation failed");

    // =========================================================================
    // RESPONSES
    // =========================================================================

    /// Responses consumed from the responses topic
    pub static ref RESPONSES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("analytics_responses_received_total", "Forecast responses consumed"),
        &["outcome"]  // outcome: resolved/orphaned/missing_key/malformed
    ).expect("metric creation failed");

    // =========================================================================
    // PUBLISHING
    // =========================================================================

    /// Publish attempts by event type and outcome
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("analytics_events_published_total", "ML events publish attempts"),
        &["event_type", "outcome"]  // outcome: accepted/suppressed/rejected/delivery_failed
    ).expect("metric creation failed");

    // =========================================================================
    // FORECAST REQUESTS
    // =========================================================================

    /// Forecast requests by final outcome
    pub static ref FORECAST_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("analytics_forecast_requests_total", "Forecast requests by outcome"),
        &["outcome"]  // outcome: success/engine_failure/timeout/send_failed/...
    ).expect("metric creation failed");

    /// Time from publish to response
    pub static ref FORECAST_WAIT_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "analytics_forecast_wait_duration_seconds",
            "Time spent waiting for the forecasting engine"
        ).buckets(exponential_buckets(0.005, 2.0, 14).unwrap())
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors that are already registered are
/// left as they are.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Correlation table
        Box::new(PENDING_REGISTERED.clone()),
        Box::new(PENDING_RESOLVED.clone()),
        Box::new(PENDING_TIMEOUTS.clone()),
        Box::new(PENDING_REQUESTS.clone()),
        // Responses
        Box::new(RESPONSES_RECEIVED.clone()),
        // Publishing
        Box::new(EVENTS_PUBLISHED.clone()),
        // Forecast requests
        Box::new(FORECAST_REQUESTS.clone()),
        Box::new(FORECAST_WAIT_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
