//! Local forecast responder for development.
//!
//! Stands in for the external forecasting engine: consumes
//! `FORECAST_REQUESTED` events and publishes a deterministic synthetic
//! forecast on the response topic, keyed by the request id. Requests it
//! cannot read get a `success: false` reply under the same key.

use chrono::{Days, NaiveDate};
use forecast_gateway::{
    ForecastPoint, ForecastRequestDto, ForecastResponse, ForecastSummary, MlEvent, MlEventType,
    ModelMetrics,
};
use shared_bus::{BusMessage, MessagePublisher, Subscription};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Historical days included ahead of the forecast
const HISTORY_DAYS: u64 = 30;

/// Baseline daily sales of the synthetic series
const BASE_SALES: f64 = 1_000.0;

/// Relative half-width of the synthetic confidence band
const CONFIDENCE_BAND: f64 = 0.1;

/// Development stand-in for the forecasting engine
pub struct DevForecastResponder {
    bus: Arc<dyn MessagePublisher>,
    response_topic: String,
}

impl DevForecastResponder {
    pub fn new(bus: Arc<dyn MessagePublisher>, response_topic: impl Into<String>) -> Self {
        Self {
            bus,
            response_topic: response_topic.into(),
        }
    }

    /// Build the reply for one ML event.
    ///
    /// Returns `None` for events that are not forecast requests, or when no
    /// key is available to route a reply.
    pub fn reply_for(&self, message: &BusMessage, today: NaiveDate) -> Option<(String, ForecastResponse)> {
        let event: MlEvent = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable ML event");
                return None;
            }
        };
        if event.event_type != MlEventType::ForecastRequested {
            debug!(event_type = %event.event_type, "Ignoring non-forecast event");
            return None;
        }

        let started = Instant::now();
        match serde_json::from_value::<ForecastRequestDto>(event.data) {
            Ok(request) => {
                let Some(key) = request.request_id.clone().or_else(|| message.key().map(str::to_string))
                else {
                    error!("Forecast request carries no request id, dropping");
                    return None;
                };
                let mut response = match request.validate() {
                    Ok(()) => synthesize(&request, today),
                    Err(e) => ForecastResponse::failure(e.to_string()),
                };
                response.processing_time_ms = Some(started.elapsed().as_millis() as u64);
                Some((key, response))
            }
            Err(e) => {
                let key = message.key()?.to_string();
                let mut response = ForecastResponse::failure(format!("Invalid forecast request: {e}"));
                response.processing_time_ms = Some(started.elapsed().as_millis() as u64);
                Some((key, response))
            }
        }
    }

    /// Consume forecast requests until the subscription closes
    #[instrument(skip_all, fields(topic = %self.response_topic))]
    pub async fn run(self, mut subscription: Subscription) {
        info!("Dev forecast responder started");

        while let Some(message) = subscription.recv().await {
            let today = chrono::Local::now().date_naive();
            let Some((key, response)) = self.reply_for(&message, today) else {
                continue;
            };

            let payload = match serde_json::to_vec(&response) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(error = %e, "Failed to encode forecast response");
                    continue;
                }
            };

            let reply = BusMessage::keyed(self.response_topic.as_str(), key.as_str(), payload);
            match self.bus.send(reply).await {
                Ok(_) => info!(correlation_id = %key, success = response.success, "Sent forecast response"),
                Err(e) => error!(correlation_id = %key, error = %e, "Failed to send forecast response"),
            }
        }

        info!("Dev forecast responder stopped");
    }
}

/// Deterministic synthetic forecast for `request`
pub fn synthesize(request: &ForecastRequestDto, today: NaiveDate) -> ForecastResponse {
    let horizon = u64::from(request.forecast_days);
    let mut points = Vec::with_capacity((HISTORY_DAYS + horizon) as usize);

    for offset in (1..=HISTORY_DAYS).rev() {
        let day = HISTORY_DAYS - offset;
        points.push(ForecastPoint {
            date: format_date(today.checked_sub_days(Days::new(offset))),
            actual_sales: Some(series(day)),
            ..ForecastPoint::default()
        });
    }

    for ahead in 1..=horizon {
        let predicted = series(HISTORY_DAYS + ahead - 1);
        let (lower, upper) = if request.include_confidence_intervals {
            (
                Some(predicted * (1.0 - CONFIDENCE_BAND)),
                Some(predicted * (1.0 + CONFIDENCE_BAND)),
            )
        } else {
            (None, None)
        };
        points.push(ForecastPoint {
            date: format_date(today.checked_add_days(Days::new(ahead))),
            actual_sales: None,
            predicted_sales: Some(predicted),
            confidence_lower: lower,
            confidence_upper: upper,
        });
    }

    let widths: Vec<f64> = points
        .iter()
        .filter_map(|p| Some(p.confidence_upper? - p.confidence_lower?))
        .collect();
    let average_width = if widths.is_empty() {
        0.0
    } else {
        widths.iter().sum::<f64>() / widths.len() as f64
    };

    let candidates = vec![
        ModelMetrics {
            model_name: "Seasonal Naive".into(),
            train_mae: 18.0,
            test_mae: 21.5,
            train_rmse: 24.0,
            test_rmse: 27.5,
        },
        ModelMetrics {
            model_name: "Linear Trend".into(),
            train_mae: 35.0,
            test_mae: 41.0,
            train_rmse: 44.0,
            test_rmse: 52.0,
        },
    ];
    let best = candidates
        .iter()
        .min_by(|a, b| a.test_mae.total_cmp(&b.test_mae))
        .map(|m| m.model_name.clone());
    let accuracy = best_accuracy(&candidates);

    ForecastResponse {
        success: true,
        error: None,
        best_model: best,
        model_metrics: request.model_comparison.then_some(candidates),
        forecast_data: Some(points),
        summary: Some(ForecastSummary {
            total_data_points: HISTORY_DAYS as u32,
            forecast_horizon_days: request.forecast_days,
            average_confidence_interval_width: average_width,
            model_accuracy_score: accuracy,
        }),
        processing_time_ms: None,
    }
}

/// Weekly seasonality on a slow upward trend
fn series(day: u64) -> f64 {
    BASE_SALES + (day % 7) as f64 * 25.0 + day as f64 * 2.0
}

fn best_accuracy(candidates: &[ModelMetrics]) -> f64 {
    let best_mae = candidates
        .iter()
        .map(|m| m.test_mae)
        .fold(f64::INFINITY, f64::min);
    (1.0 - best_mae / BASE_SALES).clamp(0.0, 1.0)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
