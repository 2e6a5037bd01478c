//! Wire types exchanged with HTTP clients and the forecasting engine.
//!
//! All JSON uses camelCase field names.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::ForecastError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default forecast horizon in days
pub const DEFAULT_FORECAST_DAYS: u32 = 30;

/// Longest forecast horizon accepted
pub const MAX_FORECAST_DAYS: u32 = 365;

/// Timestamp layout used by [`MlEvent`] (second precision, no offset)
pub const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Forecast configuration submitted by the client and forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastRequestDto {
    /// Correlation id. Always assigned by the gateway, client values are overwritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Forecast horizon in days
    pub forecast_days: u32,
    /// Whether the engine should compute confidence intervals
    pub include_confidence_intervals: bool,
    /// Whether the engine should compare candidate models
    pub model_comparison: bool,
}

impl Default for ForecastRequestDto {
    fn default() -> Self {
        Self {
            request_id: None,
            forecast_days: DEFAULT_FORECAST_DAYS,
            include_confidence_intervals: true,
            model_comparison: true,
        }
    }
}

impl ForecastRequestDto {
    /// Stamp the request with its correlation id
    pub fn with_request_id(mut self, id: &CorrelationId) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    /// Check the horizon is within bounds
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.forecast_days == 0 || self.forecast_days > MAX_FORECAST_DAYS {
            return Err(ForecastError::InvalidRequest(format!(
                "forecastDays must be between 1 and {}, got {}",
                MAX_FORECAST_DAYS, self.forecast_days
            )));
        }
        Ok(())
    }
}

/// Forecast result produced by the engine, or a failure synthesized by the gateway.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_metrics: Option<Vec<ModelMetrics>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_data: Option<Vec<ForecastPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ForecastSummary>,
    /// Engine processing time. Fractional values are truncated.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_millis"
    )]
    pub processing_time_ms: Option<u64>,
}

impl ForecastResponse {
    /// Failure response carrying only an error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Error metrics for one candidate model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelMetrics {
    pub model_name: String,
    pub train_mae: f64,
    pub test_mae: f64,
    pub train_rmse: f64,
    pub test_rmse: f64,
}

/// One forecast day
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastPoint {
    pub date: String,
    /// Present for historical points only
    pub actual_sales: Option<f64>,
    /// Present for forecast points only
    pub predicted_sales: Option<f64>,
    /// Absent when confidence intervals were not requested
    pub confidence_lower: Option<f64>,
    pub confidence_upper: Option<f64>,
}

/// Aggregate figures over the whole forecast
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastSummary {
    pub total_data_points: u32,
    pub forecast_horizon_days: u32,
    pub average_confidence_interval_width: f64,
    pub model_accuracy_score: f64,
}

/// Kind of event published on the ML events topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MlEventType {
    CustomerCreated,
    CustomerUpdated,
    OrderCreated,
    OrderUpdated,
    InitialDataGenerated,
    ForecastRequested,
}

impl MlEventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            MlEventType::CustomerCreated => "CUSTOMER_CREATED",
            MlEventType::CustomerUpdated => "CUSTOMER_UPDATED",
            MlEventType::OrderCreated => "ORDER_CREATED",
            MlEventType::OrderUpdated => "ORDER_UPDATED",
            MlEventType::InitialDataGenerated => "INITIAL_DATA_GENERATED",
            MlEventType::ForecastRequested => "FORECAST_REQUESTED",
        }
    }
}

impl fmt::Display for MlEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope for everything published on the ML events topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlEvent {
    /// Customer the event concerns, `0` for system-wide events
    pub customer_id: i64,
    pub event_type: MlEventType,
    /// Local wall-clock time, `yyyy-MM-ddTHH:mm:ss`
    pub timestamp: String,
    /// Event specific payload, `null` when the event carries none
    #[serde(default)]
    pub data: serde_json::Value,
}

impl MlEvent {
    /// Create an event stamped with the current time and no payload
    pub fn new(customer_id: i64, event_type: MlEventType) -> Self {
        Self {
            customer_id,
            event_type,
            timestamp: chrono::Local::now()
                .format(EVENT_TIMESTAMP_FORMAT)
                .to_string(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach a payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}
