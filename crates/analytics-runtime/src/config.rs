//! Runtime configuration.
//!
//! Loaded in two steps:
//!
//! 1. an optional JSON file named by `ANALYTICS_CONFIG`
//! 2. `ANALYTICS_*` environment overrides on top
//!
//! Unparseable override values are logged and ignored.

use anyhow::{ensure, Context, Result};
use forecast_gateway::domain::parse_duration;
use forecast_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use shared_bus::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_MESSAGE_BYTES};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the JSON config file
pub const CONFIG_PATH_ENV: &str = "ANALYTICS_CONFIG";

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Gateway servers, timeouts, topics and gate policy
    pub gateway: GatewayConfig,
    /// In-process bus sizing
    pub bus: BusConfig,
    /// Answer forecast requests locally instead of waiting for an engine
    pub dev_responder: bool,
}

/// Message bus sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Messages buffered per subscriber before it lags
    pub capacity: usize,
    /// Largest accepted payload in bytes
    pub max_message_bytes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl RuntimeConfig {
    /// Read a JSON config file. Missing sections take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `ANALYTICS_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let gateway = &mut self.gateway;

        override_parsed(&lookup, "ANALYTICS_HTTP_PORT", &mut gateway.http.port);
        override_parsed(&lookup, "ANALYTICS_ADMIN_PORT", &mut gateway.admin.port);
        override_parsed(&lookup, "ANALYTICS_ADMIN_ENABLED", &mut gateway.admin.enabled);
        override_parsed(
            &lookup,
            "ANALYTICS_EVENTS_ON_STARTUP",
            &mut gateway.events.enable_on_startup,
        );

        if let Some(raw) = lookup("ANALYTICS_WAIT_TIMEOUT") {
            match parse_duration(&raw) {
                Ok(timeout) => {
                    gateway.correlation.wait_timeout = timeout;
                    // Keep the sweeper from reclaiming live entries
                    if gateway.correlation.entry_ttl <= timeout {
                        gateway.correlation.entry_ttl =
                            timeout.checked_mul(2).unwrap_or(Duration::MAX);
                    }
                }
                Err(e) => warn!(value = %raw, error = %e, "Ignoring ANALYTICS_WAIT_TIMEOUT"),
            }
        }

        if let Some(topic) = lookup("ANALYTICS_ML_EVENTS_TOPIC") {
            gateway.topics.ml_events = topic;
        }
        if let Some(topic) = lookup("ANALYTICS_FORECAST_RESPONSES_TOPIC") {
            gateway.topics.forecast_responses = topic;
        }

        override_parsed(&lookup, "ANALYTICS_BUS_CAPACITY", &mut self.bus.capacity);
        override_parsed(
            &lookup,
            "ANALYTICS_MAX_MESSAGE_BYTES",
            &mut self.bus.max_message_bytes,
        );
        override_parsed(&lookup, "ANALYTICS_DEV_RESPONDER", &mut self.dev_responder);
    }

    /// Check the gateway section and bus sizing
    pub fn validate(&self) -> Result<()> {
        self.gateway
            .validate()
            .context("Invalid gateway configuration")?;
        ensure!(self.bus.capacity > 0, "bus capacity must be at least 1");
        ensure!(
            self.bus.max_message_bytes > 0,
            "bus max_message_bytes must be at least 1"
        );
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key = key, value = %raw, "Ignoring unparseable override"),
    }
}

/// Load configuration from the optional file and the process environment.
pub fn load_config() -> Result<RuntimeConfig> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration with a custom variable lookup
pub fn load_config_from<F>(lookup: F) -> Result<RuntimeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_PATH_ENV) {
        Some(path) => {
            info!(path = %path, "Loading configuration file");
            RuntimeConfig::from_file(&path)?
        }
        None => RuntimeConfig::default(),
    };

    config.apply_overrides(&lookup);
    config.validate()?;
    Ok(config)
}
