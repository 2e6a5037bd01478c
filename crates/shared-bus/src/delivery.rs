//! # Delivery Receipts
//!
//! A send has two outcomes: the synchronous accept/reject returned by
//! [`MessagePublisher::send`](crate::MessagePublisher::send), and the
//! asynchronous delivery outcome carried by a [`DeliveryReceipt`].
//! Producers that need to know whether a message actually reached the bus
//! await the receipt; fire-and-forget producers hand it to a background task.

use thiserror::Error;
use tokio::sync::oneshot;

/// Errors reported by the bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus was closed and accepts no further messages.
    #[error("message bus closed")]
    Closed,

    /// The payload exceeds the configured message size limit.
    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Payload size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The transport accepted the message but failed to deliver it.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// The transport dropped the receipt without reporting an outcome.
    #[error("delivery outcome unknown")]
    DeliveryUnknown,
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Topic the message was delivered to.
    pub topic: String,
    /// Routing key of the delivered message.
    pub key: Option<String>,
    /// Number of subscriptions that matched the topic at delivery time.
    pub receivers: usize,
    /// Transport-assigned sequence number.
    pub sequence: u64,
}

/// Completion handle for one send.
#[derive(Debug)]
pub struct DeliveryReceipt {
    outcome: oneshot::Receiver<Result<DeliveryReport, BusError>>,
}

/// Producer side of a [`DeliveryReceipt`], held by the transport.
#[derive(Debug)]
pub struct DeliveryNotifier {
    outcome: oneshot::Sender<Result<DeliveryReport, BusError>>,
}

impl DeliveryReceipt {
    /// Create a pending receipt and the notifier that completes it.
    #[must_use]
    pub fn pending() -> (DeliveryNotifier, Self) {
        let (tx, rx) = oneshot::channel();
        (DeliveryNotifier { outcome: tx }, Self { outcome: rx })
    }

    /// Create a receipt whose outcome is already known.
    #[must_use]
    pub fn ready(result: Result<DeliveryReport, BusError>) -> Self {
        let (notifier, receipt) = Self::pending();
        notifier.complete(result);
        receipt
    }

    /// Wait for the delivery outcome.
    ///
    /// Returns [`BusError::DeliveryUnknown`] if the transport dropped the
    /// notifier without completing it.
    pub async fn confirmed(self) -> Result<DeliveryReport, BusError> {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(BusError::DeliveryUnknown),
        }
    }
}

impl DeliveryNotifier {
    /// Report the delivery outcome. A receipt that was already dropped is ignored.
    pub fn complete(self, result: Result<DeliveryReport, BusError>) {
        let _ = self.outcome.send(result);
    }
}
