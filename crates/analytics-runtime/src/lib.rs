//! # Analytics Runtime Library
//!
//! Wires the in-process message bus, the forecast gateway and its background
//! consumers into one process. The entry point is the `main.rs` binary; the
//! library is exposed for integration tests.

#![allow(missing_docs)]

pub mod config;
pub mod responder;
pub mod runtime;

pub use config::{load_config, load_config_from, BusConfig, RuntimeConfig, CONFIG_PATH_ENV};
pub use responder::{synthesize, DevForecastResponder};
pub use runtime::AnalyticsRuntime;
