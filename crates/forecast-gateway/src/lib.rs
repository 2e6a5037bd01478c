// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Forecast Gateway - synchronous HTTP front for the asynchronous forecasting engine.
//!
//! A forecast request arrives over HTTP, is published onto the message bus
//! as an ML event, and the HTTP call blocks until the engine's response comes
//! back on the response topic or the wait times out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         FORECAST GATEWAY                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐                        ┌─────────────┐               │
//! │  │    HTTP     │                        │    Admin    │               │
//! │  │  Port 8080  │                        │  Port 8081  │               │
//! │  └──────┬──────┘                        └──────┬──────┘               │
//! │         │                                      │                      │
//! │  ┌──────┴──────────────────────────────────────┴──────┐               │
//! │  │        Middleware: CORS → Tracing → Metrics        │               │
//! │  └──────────────────────────┬─────────────────────────┘               │
//! │                             │                                         │
//! │  ┌──────────────────────────┴─────────────────────────┐               │
//! │  │   ForecastRequester: register → publish → wait     │               │
//! │  └───────────┬──────────────────────────┬─────────────┘               │
//! │              │                          │                             │
//! │  ┌───────────┴─────────┐    ┌───────────┴─────────────┐               │
//! │  │ MlEventPublisher    │    │ CorrelationTable        │               │
//! │  │ (behind EventGate)  │    │ (id → oneshot handle)   │               │
//! │  └───────────┬─────────┘    └───────────▲─────────────┘               │
//! │              │                          │ resolve                     │
//! │              │              ┌───────────┴─────────────┐               │
//! │              │              │ ForecastResponseListener│               │
//! │              │              └───────────▲─────────────┘               │
//! └──────────────┼──────────────────────────┼─────────────────────────────┘
//!                ▼                          │
//!           "ml-events"          "forecast-responses"
//!                └────────► engine ─────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use forecast_gateway::{ForecastGatewayService, GatewayConfig};
//! use shared_bus::{InMemoryMessageBus, TopicFilter};
//!
//! let bus = Arc::new(InMemoryMessageBus::new());
//! let service = ForecastGatewayService::new(GatewayConfig::default(), bus.clone())?;
//! tokio::spawn(service.response_listener().run(
//!     bus.subscribe(TopicFilter::topic("forecast-responses")),
//! ));
//! service.gate().enable();
//! service.start(shutdown_rx).await?;
//! ```

pub mod domain;
pub mod ipc;
pub mod middleware;
pub mod service;

// Re-exports
pub use domain::config::GatewayConfig;
pub use domain::correlation::CorrelationId;
pub use domain::error::{CorrelationError, ForecastError, GatewayError, PublishError};
pub use domain::pending::CorrelationTable;
pub use domain::types::*;
pub use ipc::{
    Correlator, EventGate, ForecastRequester, ForecastResponseListener, ListenerOutcome,
    MlEventPublisher, PublishAck,
};
pub use middleware::GatewayMetrics;
pub use service::{status_for, ForecastGatewayService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
