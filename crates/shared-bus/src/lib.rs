//! # Shared Bus - Keyed Message Bus
//!
//! Topic-addressed publish/subscribe transport used between the forecast
//! gateway and the forecasting engine.
//!
//! ## Model
//!
//! - Every message has a topic, an optional routing key and an opaque payload.
//! - Producers use the key for the entity or request the message is about;
//!   consumers correlate on it.
//! - Delivery is at-least-once from the consumer's point of view and ordering
//!   across keys is not guaranteed.
//!
//! ```text
//! ┌──────────────┐                        ┌──────────────┐
//! │   Gateway    │  send(ml-events, id)   │    Engine    │
//! │              │ ──────┐                │              │
//! └──────────────┘       │                └──────────────┘
//!        ↑               ▼                        │
//!        │        ┌──────────────┐                │
//!        └─────── │  Message Bus │ ←──────────────┘
//!  subscribe()    └──────────────┘  send(forecast-responses, id)
//! ```
//!
//! ## Send Outcomes
//!
//! `MessagePublisher::send` returns `Err` for synchronous rejections (bus
//! closed, payload too large). Accepted sends return a `DeliveryReceipt`
//! that resolves with the asynchronous outcome.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod delivery;
pub mod message;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use delivery::{BusError, DeliveryNotifier, DeliveryReceipt, DeliveryReport};
pub use message::{BusMessage, TopicFilter};
pub use publisher::{InMemoryMessageBus, MessagePublisher};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Largest payload accepted by default (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Tracking key used for subscriptions that accept every topic.
pub const WILDCARD_TOPIC: &str = "*";
