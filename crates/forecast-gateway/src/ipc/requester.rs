//! Forecast requester - drives one forecast through the bus.
//!
//! ```text
//! generate id -> register -> publish -> wait
//!                              │          │
//!                    send error: remove   └─ resolved by the listener,
//!                    entry and fail          or times out
//! ```

use crate::domain::correlation::CorrelationId;
use crate::domain::error::ForecastError;
use crate::domain::types::{ForecastRequestDto, ForecastResponse};
use crate::ipc::correlator::Correlator;
use crate::ipc::publisher::{MlEventPublisher, PublishAck};
use analytics_telemetry::{HistogramTimer, FORECAST_REQUESTS, FORECAST_WAIT_DURATION};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn, Span};

/// Runs the publish/suspend/resume protocol for forecast requests.
#[derive(Clone)]
pub struct ForecastRequester {
    correlator: Correlator<ForecastResponse>,
    publisher: Arc<MlEventPublisher>,
}

impl ForecastRequester {
    pub fn new(correlator: Correlator<ForecastResponse>, publisher: Arc<MlEventPublisher>) -> Self {
        Self {
            correlator,
            publisher,
        }
    }

    /// Request a forecast under a fresh id, waiting the default timeout.
    pub async fn request_forecast(
        &self,
        request: ForecastRequestDto,
    ) -> Result<ForecastResponse, ForecastError> {
        self.request_forecast_with(CorrelationId::new(), request, self.correlator.default_timeout())
            .await
    }

    /// Request a forecast under a caller-chosen id and timeout.
    ///
    /// Any `requestId` already on `request` is replaced by `id`.
    #[instrument(
        skip(self, request),
        fields(
            correlation_id = %id,
            forecast_days = request.forecast_days,
            success = tracing::field::Empty
        )
    )]
    pub async fn request_forecast_with(
        &self,
        id: CorrelationId,
        request: ForecastRequestDto,
        timeout: Duration,
    ) -> Result<ForecastResponse, ForecastError> {
        info!("Generating forecast request");

        let result = self.run(&id, request, timeout).await;
        match &result {
            Ok(response) if response.success => {
                FORECAST_REQUESTS.with_label_values(&["success"]).inc();
                info!(best_model = ?response.best_model, "Forecast completed");
            }
            Ok(response) => {
                FORECAST_REQUESTS.with_label_values(&["engine_failure"]).inc();
                warn!(error = ?response.error, "Forecasting engine reported a failure");
            }
            Err(e) => {
                FORECAST_REQUESTS.with_label_values(&[e.kind()]).inc();
                error!(error = %e, "Generating forecast request failed");
            }
        }
        result
    }

    async fn run(
        &self,
        id: &CorrelationId,
        request: ForecastRequestDto,
        timeout: Duration,
    ) -> Result<ForecastResponse, ForecastError> {
        request.validate()?;
        let request = request.with_request_id(id);

        // Must be registered before the request can reach the engine
        self.correlator.register_pending_request(id)?;

        match self.publisher.publish_forecast_request(&request).await {
            Ok(PublishAck::Accepted) => {}
            Ok(PublishAck::Suppressed) => {
                warn!(
                    timeout_ms = timeout.as_millis(),
                    "Event publishing disabled, forecast request will time out"
                );
            }
            Err(e) => {
                self.correlator.table().remove(id);
                return Err(e.into());
            }
        }

        let _timer = HistogramTimer::new(&FORECAST_WAIT_DURATION);
        let response = self.correlator.wait_for_result(id, timeout).await?;
        Span::current().record("success", response.success);
        Ok(response)
    }

    /// The correlator backing this requester
    pub fn correlator(&self) -> &Correlator<ForecastResponse> {
        &self.correlator
    }

    /// The publisher backing this requester
    pub fn publisher(&self) -> &Arc<MlEventPublisher> {
        &self.publisher
    }
}
