//! # Analytics Runtime
//!
//! Entry point for the analytics forecast gateway.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logs, optional OTLP traces, Prometheus registry)
//! 2. Load configuration (file + `ANALYTICS_*` environment)
//! 3. Wire bus, gateway, response listener and optional dev responder
//! 4. Open the event gate and serve until Ctrl+C

use std::sync::Arc;

use analytics_runtime::{load_config, AnalyticsRuntime};
use analytics_telemetry::{init_telemetry, TelemetryConfig};
use anyhow::{Context, Result};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .await
        .context("Failed to initialize telemetry")?;

    let config = load_config().context("Failed to load configuration")?;

    info!("===========================================");
    info!("  Analytics Forecast Gateway v{}", forecast_gateway::VERSION);
    info!("===========================================");
    info!("HTTP:  {}", config.gateway.http_addr());
    if config.gateway.admin.enabled {
        info!("Admin: {}", config.gateway.admin_addr());
    }

    let runtime = Arc::new(AnalyticsRuntime::new(config)?);
    runtime.start();

    let signal_runtime = Arc::clone(&runtime);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        signal_runtime.shutdown();
    });

    info!("Gateway is running. Press Ctrl+C to stop.");
    runtime.serve().await?;

    info!("Shutdown complete");
    Ok(())
}
