//! Error taxonomy for the forecast gateway.
//!
//! - [`CorrelationError`]: outcomes of the pending-request table other than a value
//! - [`PublishError`]: synchronous failures of an outbound publish
//! - [`ForecastError`]: everything the HTTP-facing flow can fail with
//! - [`GatewayError`]: service startup and runtime failures

use crate::domain::correlation::CorrelationId;
use crate::domain::types::MlEventType;
use shared_bus::BusError;
use std::time::Duration;

/// Non-value outcomes of registering or waiting on a correlation id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    /// No response arrived before the deadline
    #[error("no response for {id} within {}ms", .timeout.as_millis())]
    TimedOut {
        id: CorrelationId,
        timeout: Duration,
    },

    /// Wait called for an id that has no pending entry
    #[error("no pending request found for ID: {0}")]
    NotRegistered(CorrelationId),

    /// Register called for an id that is already pending
    #[error("correlation ID already registered: {0}")]
    DuplicateId(CorrelationId),
}

/// Synchronous publish failures
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Event could not be encoded
    #[error("failed to serialize {event_type} event: {source}")]
    Serialization {
        event_type: MlEventType,
        #[source]
        source: serde_json::Error,
    },

    /// Correlated event has no id to use as its routing key
    #[error("{event_type} event has no request id")]
    MissingKey { event_type: MlEventType },

    /// Transport rejected the message
    #[error("failed to send {event_type} event: {source}")]
    Send {
        event_type: MlEventType,
        #[source]
        source: BusError,
    },
}

/// Failures of a forecast request, as seen by the HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Forecast generation timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("No pending request found for ID: {0}")]
    NotRegistered(CorrelationId),

    #[error("Duplicate request ID: {0}")]
    DuplicateId(CorrelationId),

    #[error("Could not publish forecast request: {0}")]
    SendFailed(#[source] PublishError),

    #[error("Invalid forecast request: {0}")]
    InvalidRequest(String),
}

impl From<CorrelationError> for ForecastError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::TimedOut { timeout, .. } => ForecastError::TimedOut(timeout),
            CorrelationError::NotRegistered(id) => ForecastError::NotRegistered(id),
            CorrelationError::DuplicateId(id) => ForecastError::DuplicateId(id),
        }
    }
}

impl From<PublishError> for ForecastError {
    fn from(e: PublishError) -> Self {
        ForecastError::SendFailed(e)
    }
}

impl ForecastError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::TimedOut(_) => "timeout",
            ForecastError::NotRegistered(_) => "not_registered",
            ForecastError::DuplicateId(_) => "duplicate_id",
            ForecastError::SendFailed(_) => "send_failed",
            ForecastError::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Gateway-level errors (service lifecycle, internal use)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server stopped with an error
    #[error("server error: {0}")]
    Server(String),
}
