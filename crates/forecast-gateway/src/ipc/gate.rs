//! Event gate - process-wide switch for outbound publishes.
//!
//! Closed by default. Lifecycle hooks open it once startup has finished and
//! close it on shutdown; every publish site reads it before sending.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct EventGate {
    enabled: AtomicBool,
}

impl EventGate {
    /// Create a closed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate in the given state
    pub fn with_state(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Let subsequent publishes through
    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            info!("Event publishing enabled");
        }
    }

    /// Suppress subsequent publishes
    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            info!("Event publishing disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
