//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public HTTP server
    pub http: HttpConfig,
    /// Admin server (localhost only by default)
    pub admin: AdminConfig,
    /// Pending-request timeouts and sweeping
    pub correlation: CorrelationConfig,
    /// Bus topic names
    pub topics: TopicsConfig,
    /// Event gate startup policy
    pub events: EventsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.enabled && self.admin.port == self.http.port {
            return Err(ConfigError::DuplicatePorts);
        }

        if self.correlation.wait_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "wait_timeout cannot be 0".into(),
            ));
        }
        if self.correlation.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "sweep_interval cannot be 0".into(),
            ));
        }
        // Entries are registered before their wait starts, so they outlive it
        if self.correlation.entry_ttl <= self.correlation.wait_timeout {
            return Err(ConfigError::InvalidTimeout(format!(
                "entry_ttl ({}ms) must exceed wait_timeout ({}ms)",
                self.correlation.entry_ttl.as_millis(),
                self.correlation.wait_timeout.as_millis()
            )));
        }

        let ml_events = self.topics.ml_events.trim();
        let responses = self.topics.forecast_responses.trim();
        if ml_events.is_empty() || responses.is_empty() {
            return Err(ConfigError::InvalidTopic("topic names cannot be empty".into()));
        }
        if ml_events == responses {
            return Err(ConfigError::InvalidTopic(format!(
                "request and response topics must differ, both are '{ml_events}'"
            )));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Get Admin server bind address
    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(self.admin.host, self.admin.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Admin server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (localhost only by default)
    pub host: IpAddr,
    /// Port (default: 8081)
    pub port: u16,
    /// Enable admin server
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8081,
            enabled: true,
        }
    }
}

/// Pending-request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// How long a forecast request waits for its response
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    /// How often the sweeper scans for abandoned entries
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Age after which an entry nobody waits on is dropped
    #[serde(with = "humantime_serde")]
    pub entry_ttl: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
            entry_ttl: Duration::from_secs(60),
        }
    }
}

/// Bus topic names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Outbound work requests and domain events
    pub ml_events: String,
    /// Inbound forecast results
    pub forecast_responses: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            ml_events: "ml-events".to_string(),
            forecast_responses: "forecast-responses".to_string(),
        }
    }
}

/// Event gate startup policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Open the gate once the process has finished starting
    pub enable_on_startup: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enable_on_startup: true,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            max_age: 3600,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// HTTP and admin servers share a port
    #[error("duplicate ports configured")]
    DuplicatePorts,
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Invalid topic name
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Parse a duration string such as `"30s"`, `"500ms"`, `"2m"`, `"1h"` or plain seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::Invalid(format!("invalid duration '{s}'"));

    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    } else if let Some(mins) = s.strip_suffix('m') {
        scaled_secs(mins, 60).ok_or_else(invalid)
    } else if let Some(hours) = s.strip_suffix('h') {
        scaled_secs(hours, 3600).ok_or_else(invalid)
    } else {
        s.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    }
}

fn scaled_secs(value: &str, unit: u64) -> Option<Duration> {
    let value = value.trim().parse::<u64>().ok()?;
    value.checked_mul(unit).map(Duration::from_secs)
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
