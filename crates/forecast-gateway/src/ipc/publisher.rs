//! Publisher for the ML events topic.
//!
//! Every publish reads the [`EventGate`] first. A closed gate turns the call
//! into a logged no-op that never reaches the transport.
//!
//! A send has two outcomes. A synchronous rejection (serialization or
//! transport refusal) is returned to the caller. The asynchronous delivery
//! outcome is only logged, from a spawned task awaiting the receipt; for
//! forecast requests the caller's wait timeout is the backstop.

use crate::domain::error::PublishError;
use crate::domain::types::{ForecastRequestDto, MlEvent, MlEventType};
use crate::ipc::gate::EventGate;
use analytics_telemetry::EVENTS_PUBLISHED;
use shared_bus::{BusMessage, DeliveryReceipt, MessagePublisher};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Key used for system-wide events
const SYSTEM_KEY: &str = "0";

/// Synchronous outcome of a publish that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAck {
    /// Handed to the transport
    Accepted,
    /// Dropped because the event gate is closed
    Suppressed,
}

/// Publishes ML events onto the bus
pub struct MlEventPublisher {
    bus: Arc<dyn MessagePublisher>,
    gate: Arc<EventGate>,
    topic: String,
}

impl MlEventPublisher {
    pub fn new(bus: Arc<dyn MessagePublisher>, gate: Arc<EventGate>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            gate,
            topic: topic.into(),
        }
    }

    /// The gate this publisher obeys
    pub fn gate(&self) -> &Arc<EventGate> {
        &self.gate
    }

    /// Destination topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a forecast request keyed by its request id.
    pub async fn publish_forecast_request(
        &self,
        request: &ForecastRequestDto,
    ) -> Result<PublishAck, PublishError> {
        let event_type = MlEventType::ForecastRequested;
        let Some(request_id) = request.request_id.clone() else {
            return Err(PublishError::MissingKey { event_type });
        };

        let data = serde_json::to_value(request)
            .map_err(|source| PublishError::Serialization { event_type, source })?;
        let event = MlEvent::new(0, event_type).with_data(data);

        self.publish(event, request_id).await
    }

    pub async fn publish_customer_created(&self, customer_id: i64) {
        self.publish_and_forget(MlEvent::new(customer_id, MlEventType::CustomerCreated))
            .await;
    }

    pub async fn publish_customer_updated(&self, customer_id: i64) {
        self.publish_and_forget(MlEvent::new(customer_id, MlEventType::CustomerUpdated))
            .await;
    }

    /// Announce a new order; the payload is the order id
    pub async fn publish_order_created(&self, customer_id: i64, order_id: i64) {
        let event =
            MlEvent::new(customer_id, MlEventType::OrderCreated).with_data(order_id.into());
        self.publish_and_forget(event).await;
    }

    /// Announce an order change; the payload is the order id
    pub async fn publish_order_updated(&self, customer_id: i64, order_id: i64) {
        let event =
            MlEvent::new(customer_id, MlEventType::OrderUpdated).with_data(order_id.into());
        self.publish_and_forget(event).await;
    }

    /// Tell the engine that bulk data is loaded and every customer should be processed
    pub async fn publish_initial_data_generated(&self) {
        self.publish_and_forget(MlEvent::new(0, MlEventType::InitialDataGenerated))
            .await;
    }

    /// Fire-and-forget publish keyed by customer id. Failures are logged.
    async fn publish_and_forget(&self, event: MlEvent) {
        let event_type = event.event_type;
        let customer_id = event.customer_id;
        let key = if customer_id == 0 {
            SYSTEM_KEY.to_string()
        } else {
            customer_id.to_string()
        };

        if let Err(e) = self.publish(event, key).await {
            error!(
                event_type = %event_type,
                customer_id = customer_id,
                error = %e,
                "Error publishing event"
            );
        }
    }

    async fn publish(&self, event: MlEvent, key: String) -> Result<PublishAck, PublishError> {
        let event_type = event.event_type;

        if !self.gate.is_enabled() {
            debug!(
                event_type = %event_type,
                key = %key,
                "ML events disabled - skipping event"
            );
            EVENTS_PUBLISHED
                .with_label_values(&[event_type.as_str(), "suppressed"])
                .inc();
            return Ok(PublishAck::Suppressed);
        }

        let payload = serde_json::to_vec(&event)
            .map_err(|source| PublishError::Serialization { event_type, source })?;
        let message = BusMessage::keyed(self.topic.as_str(), key.as_str(), payload);

        let receipt = match self.bus.send(message).await {
            Ok(receipt) => receipt,
            Err(source) => {
                EVENTS_PUBLISHED
                    .with_label_values(&[event_type.as_str(), "rejected"])
                    .inc();
                return Err(PublishError::Send { event_type, source });
            }
        };

        EVENTS_PUBLISHED
            .with_label_values(&[event_type.as_str(), "accepted"])
            .inc();
        tokio::spawn(report_delivery(receipt, event_type, key));

        Ok(PublishAck::Accepted)
    }
}

/// Log the asynchronous delivery outcome of one send
async fn report_delivery(receipt: DeliveryReceipt, event_type: MlEventType, key: String) {
    match receipt.confirmed().await {
        Ok(report) if report.receivers == 0 => {
            warn!(
                event_type = %event_type,
                key = %key,
                topic = %report.topic,
                "Published event has no subscribers"
            );
        }
        Ok(report) => {
            info!(
                event_type = %event_type,
                key = %key,
                receivers = report.receivers,
                sequence = report.sequence,
                "Published event"
            );
        }
        Err(e) => {
            EVENTS_PUBLISHED
                .with_label_values(&[event_type.as_str(), "delivery_failed"])
                .inc();
            error!(
                event_type = %event_type,
                key = %key,
                error = %e,
                "Failed to publish event"
            );
        }
    }
}
