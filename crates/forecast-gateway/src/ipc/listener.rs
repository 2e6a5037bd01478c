//! Listener for the forecast responses topic.
//!
//! The message key is authoritative for correlation. Each response resolves
//! the pending request with the same id at most once; responses nobody is
//! waiting for are logged and dropped. The listener never retries and never
//! fails the subscription loop.

use crate::domain::correlation::CorrelationId;
use crate::domain::pending::CorrelationTable;
use crate::domain::types::ForecastResponse;
use analytics_telemetry::{PENDING_RESOLVED, RESPONSES_RECEIVED};
use shared_bus::{BusMessage, Subscription};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// A waiting request received the response
    Resolved,
    /// No live pending request for the key (late, duplicate or unsolicited)
    Orphaned,
    /// The message carried no key and was dropped
    MissingKey,
}

/// Resolves pending forecast requests from inbound responses.
pub struct ForecastResponseListener {
    table: Arc<CorrelationTable<ForecastResponse>>,
}

impl ForecastResponseListener {
    pub fn new(table: Arc<CorrelationTable<ForecastResponse>>) -> Self {
        Self { table }
    }

    /// Handle one message from the responses topic.
    pub fn on_message(&self, message: &BusMessage) -> ListenerOutcome {
        let Some(key) = message.key() else {
            warn!(
                topic = %message.topic,
                message_id = %message.id,
                "Dropping forecast response without key"
            );
            RESPONSES_RECEIVED.with_label_values(&["missing_key"]).inc();
            return ListenerOutcome::MissingKey;
        };
        let id = CorrelationId::from(key);
        info!(correlation_id = %id, "Received forecast response");

        let response = match serde_json::from_slice::<ForecastResponse>(&message.payload) {
            Ok(response) => response,
            Err(e) => {
                // Fail the waiter now rather than at its deadline
                error!(correlation_id = %id, error = %e, "Malformed forecast response");
                RESPONSES_RECEIVED.with_label_values(&["malformed"]).inc();
                ForecastResponse::failure(format!("Malformed forecast response: {e}"))
            }
        };

        if self.table.resolve(&id, response) {
            PENDING_RESOLVED.inc();
            RESPONSES_RECEIVED.with_label_values(&["resolved"]).inc();
            debug!(correlation_id = %id, "Completed pending request");
            ListenerOutcome::Resolved
        } else {
            RESPONSES_RECEIVED.with_label_values(&["orphaned"]).inc();
            warn!(correlation_id = %id, "No pending request found for key");
            ListenerOutcome::Orphaned
        }
    }

    /// Consume the subscription until the bus goes away.
    ///
    /// Should be spawned as a background task.
    #[instrument(skip_all, name = "forecast_response_listener")]
    pub async fn run(self, mut subscription: Subscription) {
        info!(topics = ?subscription.filter().topics, "Listening for forecast responses");

        while let Some(message) = subscription.recv().await {
            self.on_message(&message);
        }

        info!("Message bus closed, forecast response listener stopped");
    }
}
