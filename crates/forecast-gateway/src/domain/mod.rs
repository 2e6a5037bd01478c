//! Domain types for the forecast gateway.
//!
//! Wire DTOs, configuration, the error taxonomy and the correlation table.

pub mod config;
pub mod correlation;
pub mod error;
pub mod pending;
pub mod types;

pub use config::{parse_duration, ConfigError, GatewayConfig};
pub use correlation::CorrelationId;
pub use error::{CorrelationError, ForecastError, GatewayError, PublishError};
pub use pending::{cleanup_task, CorrelationTable, PendingStats, PendingStatsSnapshot};
pub use types::*;
