//! # Message Publisher
//!
//! Defines the publishing side of the bus.

use crate::delivery::{BusError, DeliveryReceipt, DeliveryReport};
use crate::message::{BusMessage, TopicFilter};
use crate::subscriber::Subscription;
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_MESSAGE_BYTES, WILDCARD_TOPIC};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Trait for sending messages to the bus.
///
/// This is the seam producers depend on, so tests can substitute a double
/// that records or rejects sends.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Send a message.
    ///
    /// # Returns
    ///
    /// - `Ok(receipt)` - the transport accepted the message; the receipt
    ///   resolves once the delivery outcome is known
    /// - `Err(e)` - the transport rejected the message synchronously
    async fn send(&self, message: BusMessage) -> Result<DeliveryReceipt, BusError>;

    /// Total number of messages accepted for delivery.
    fn messages_published(&self) -> u64;
}

/// In-memory implementation of the bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Suitable for single-process operation; a networked broker would provide a
/// different `MessagePublisher` implementation.
pub struct InMemoryMessageBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Active subscription count by topic (`*` for wildcard subscriptions).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages accepted.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,

    /// Largest payload accepted.
    max_message_bytes: usize,

    /// Set once `close()` is called.
    closed: AtomicBool,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            capacity,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            closed: AtomicBool::new(false),
        }
    }

    /// Set the largest payload the bus accepts.
    #[must_use]
    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = limit;
        self
    }

    /// Subscribe to messages matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_keys = topic_keys(&filter);

        if let Ok(mut subs) = self.subscriptions.write() {
            for key in &topic_keys {
                *subs.entry(key.clone()).or_insert(0) += 1;
            }
        }

        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_keys)
    }

    /// Number of live subscriptions whose filter accepts `topic`.
    #[must_use]
    pub fn subscribers_for(&self, topic: &str) -> usize {
        let Ok(subs) = self.subscriptions.read() else {
            return 0;
        };
        subs.get(topic).copied().unwrap_or(0) + subs.get(WILDCARD_TOPIC).copied().unwrap_or(0)
    }

    /// Get the number of active subscribers across all topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the payload size limit.
    #[must_use]
    pub fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    /// Stop accepting messages. Existing subscriptions drain what is buffered.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Message bus closed");
        }
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn send(&self, message: BusMessage) -> Result<DeliveryReceipt, BusError> {
        if self.is_closed() {
            warn!(topic = %message.topic, key = ?message.key, "Send rejected, bus closed");
            return Err(BusError::Closed);
        }

        if message.size() > self.max_message_bytes {
            return Err(BusError::MessageTooLarge {
                size: message.size(),
                limit: self.max_message_bytes,
            });
        }

        let sequence = self.messages_published.fetch_add(1, Ordering::Relaxed) + 1;
        let receivers = self.subscribers_for(&message.topic);
        let topic = message.topic.clone();
        let key = message.key.clone();

        match self.sender.send(message) {
            Ok(_) => {
                debug!(
                    topic = %topic,
                    key = ?key,
                    receivers = receivers,
                    sequence = sequence,
                    "Message published"
                );
            }
            Err(_) => {
                // No receivers at all; the message is dropped
                debug!(topic = %topic, key = ?key, "Message dropped (no receivers)");
            }
        }

        Ok(DeliveryReceipt::ready(Ok(DeliveryReport {
            topic,
            key,
            receivers,
            sequence,
        })))
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

fn topic_keys(filter: &TopicFilter) -> Vec<String> {
    if filter.is_wildcard() {
        vec![WILDCARD_TOPIC.to_string()]
    } else {
        filter.topics.clone()
    }
}
