//! Bus-facing side of the gateway.
//!
//! Outbound work requests go through the gated [`MlEventPublisher`]; inbound
//! responses are matched to waiting requests by the
//! [`ForecastResponseListener`] through the shared correlation table.

pub mod correlator;
pub mod gate;
pub mod listener;
pub mod publisher;
pub mod requester;

pub use correlator::{Correlator, DEFAULT_WAIT_TIMEOUT};
pub use gate::EventGate;
pub use listener::{ForecastResponseListener, ListenerOutcome};
pub use publisher::{MlEventPublisher, PublishAck};
pub use requester::ForecastRequester;
