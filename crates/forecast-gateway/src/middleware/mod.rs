//! Middleware stack for the forecast gateway.
//!
//! Layer order: Request → CORS → Tracing → Metrics → Handler

pub mod cors;
pub mod metrics;
pub mod tracing;

pub use cors::create_cors_layer;
pub use metrics::{track_requests, GatewayMetrics, RequestTimer};
pub use tracing::TracingLayer;
