//! # Analytics Telemetry
//!
//! Observability for the forecast gateway.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an `EnvFilter`, pretty or JSON console output
//! - **Traces**: optional OpenTelemetry OTLP export
//! - **Metrics**: Prometheus counters and histograms for the correlation path
//!
//! ## Usage
//!
//! ```rust,ignore
//! use analytics_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await?;
//!     // Spans, logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `http://localhost:4317` | OTLP collector endpoint |
//! | `OTEL_SERVICE_NAME` | `analytics-gateway` | Service name in traces |
//! | `ANALYTICS_OTLP_ENABLED` | `false` | Export spans over OTLP |
//! | `ANALYTICS_LOG_LEVEL` | `info` | Log level filter |
//! | `ANALYTICS_JSON_LOGS` | `false` | JSON console output |
//! | `ANALYTICS_ENV` | `development` | Deployment environment |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, EVENTS_PUBLISHED,
    FORECAST_REQUESTS, FORECAST_WAIT_DURATION, PENDING_REGISTERED, PENDING_REQUESTS,
    PENDING_RESOLVED, PENDING_TIMEOUTS, RESPONSES_RECEIVED,
};
pub use tracing_setup::{env_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize metrics and the global tracing subscriber.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first (synchronous)
    let metrics_handle = register_metrics()?;

    let tracing_guard = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
