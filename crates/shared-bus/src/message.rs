//! # Bus Messages
//!
//! Keyed, topic-addressed byte messages carried by the bus.
//!
//! The key plays the role of a partition/routing key: producers set it to the
//! entity or request identifier the message is about, and consumers use it to
//! correlate the message with local state. Payloads are opaque bytes; encoding
//! is the producer's concern.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A single message travelling over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Unique message id, assigned at construction.
    pub id: Uuid,
    /// Destination topic.
    pub topic: String,
    /// Routing key. `None` for unkeyed messages.
    pub key: Option<String>,
    /// Encoded payload.
    pub payload: Bytes,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl BusMessage {
    /// Create a message with an optional key.
    pub fn new(topic: impl Into<String>, key: Option<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key,
            payload: payload.into(),
            timestamp_ms: now_millis(),
        }
    }

    /// Create a keyed message.
    pub fn keyed(
        topic: impl Into<String>,
        key: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(topic, Some(key.into()), payload)
    }

    /// The routing key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Topics to receive. Empty means all topics.
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// Filter that accepts every topic.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// Filter for a set of topics.
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter for a single topic.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }

    /// Whether this filter accepts every topic.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.topics.is_empty()
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        self.accepts_topic(&message.topic)
    }

    /// Check if a topic name matches this filter.
    #[must_use]
    pub fn accepts_topic(&self, topic: &str) -> bool {
        self.is_wildcard() || self.topics.iter().any(|t| t == topic)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_message() {
        let msg = BusMessage::keyed("forecast-responses", "req-42", b"{}".to_vec());
        assert_eq!(msg.key(), Some("req-42"));
        assert_eq!(msg.topic, "forecast-responses");
        assert_eq!(msg.size(), 2);
        assert!(msg.timestamp_ms > 0);
    }

    #[test]
    fn test_unkeyed_message() {
        let msg = BusMessage::new("ml-events", None, Bytes::from_static(b"x"));
        assert!(msg.key().is_none());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = BusMessage::keyed("t", "k", Bytes::new());
        let b = BusMessage::keyed("t", "k", Bytes::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_filter_all() {
        let filter = TopicFilter::all();
        let msg = BusMessage::keyed("anything", "k", Bytes::new());
        assert!(filter.is_wildcard());
        assert!(filter.matches(&msg));
    }

    #[test]
    fn test_filter_specific_topics() {
        let filter = TopicFilter::topics(["ml-events", "forecast-responses"]);
        assert!(filter.accepts_topic("ml-events"));
        assert!(filter.accepts_topic("forecast-responses"));
        assert!(!filter.accepts_topic("audit"));
    }

    #[test]
    fn test_filter_single_topic() {
        let filter = TopicFilter::topic("ml-events");
        let hit = BusMessage::keyed("ml-events", "1", Bytes::new());
        let miss = BusMessage::keyed("forecast-responses", "1", Bytes::new());
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }
}
