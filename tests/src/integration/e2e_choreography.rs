//! # End-to-End Forecast Flow Tests
//!
//! Tests the complete request/response correlation flow:
//!
//! ```text
//! [HTTP client] ──POST /api/forecasting/generate──→ [Gateway]
//!                                                       │ register(id)
//!                                                       ↓
//!                                   ml-events ←── [MlEventPublisher] (gated)
//!                                       │
//!                                       ↓
//!                               [Forecast engine]
//!                                       │
//!                                       ↓
//!                           forecast-responses ──→ [Listener] ── resolve(id)
//!                                                       │
//!                                                       ↓
//!                                              200 + ForecastResponse
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: request answered by the engine
//! 2. **Gate Control**: admin toggles switch between answered and timed out
//! 3. **Bad Input**: malformed bodies rejected before anything is registered
//! 4. **Observability**: admin pending-table and request stats

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use analytics_runtime::{AnalyticsRuntime, RuntimeConfig};
    use shared_bus::MessagePublisher;
    use axum::Router;
    use serde_json::{json, Value};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    struct Running {
        runtime: Arc<AnalyticsRuntime>,
        http: SocketAddr,
        admin: SocketAddr,
        client: reqwest::Client,
    }

    async fn running(wait: Duration) -> Running {
        let mut config = RuntimeConfig {
            dev_responder: true,
            ..RuntimeConfig::default()
        };
        config.gateway.correlation.wait_timeout = wait;

        let runtime = Arc::new(AnalyticsRuntime::new(config).unwrap());
        runtime.start();
        let http = serve(runtime.gateway().http_router()).await;
        let admin = serve(runtime.gateway().admin_router()).await;

        Running {
            runtime,
            http,
            admin,
            client: reqwest::Client::new(),
        }
    }

    impl Running {
        async fn generate(&self, body: Value) -> (u16, Value) {
            let response = self
                .client
                .post(format!("http://{}/api/forecasting/generate", self.http))
                .json(&body)
                .send()
                .await
                .unwrap();
            let status = response.status().as_u16();
            (status, response.json().await.unwrap())
        }

        async fn admin_post(&self, path: &str) -> Value {
            self.client
                .post(format!("http://{}{}", self.admin, path))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_forecast_answered_by_engine() {
        // Arrange
        let env = running(Duration::from_secs(5)).await;

        // Act
        let (status, body) = env
            .generate(json!({ "forecastDays": 10, "includeConfidenceIntervals": false }))
            .await;

        // Assert
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["summary"]["forecastHorizonDays"], 10);
        let points = body["forecastData"].as_array().unwrap();
        assert!(points
            .iter()
            .filter(|p| p["predictedSales"].is_number())
            .all(|p| p["confidenceLower"].is_null()));
        assert!(env.runtime.gateway().table().is_empty());
    }

    #[tokio::test]
    async fn test_parallel_forecasts() {
        // Arrange
        let env = Arc::new(running(Duration::from_secs(5)).await);

        // Act
        let handles: Vec<_> = (1..=5)
            .map(|days| {
                let env = Arc::clone(&env);
                tokio::spawn(async move { (days, env.generate(json!({ "forecastDays": days })).await) })
            })
            .collect();

        // Assert
        for handle in handles {
            let (days, (status, body)) = handle.await.unwrap();
            assert_eq!(status, 200);
            assert_eq!(body["summary"]["forecastHorizonDays"], days);
        }
        assert_eq!(env.runtime.gateway().table().stats().snapshot().resolved, 5);
    }

    // =============================================================================
    // GATE CONTROL
    // =============================================================================

    #[tokio::test]
    async fn test_admin_gate_toggle() {
        // Arrange
        let env = running(Duration::from_millis(300)).await;

        // Act: close the gate
        let toggled = env.admin_post("/events/disable").await;
        let (status, body) = env.generate(json!({})).await;

        // Assert: nothing published, request times out
        assert_eq!(toggled["eventsEnabled"], false);
        assert_eq!(status, 504);
        assert_eq!(body["success"], false);
        assert_eq!(env.runtime.bus().messages_published(), 0);

        // Act: reopen
        let toggled = env.admin_post("/events/enable").await;
        let (status, body) = env.generate(json!({})).await;

        // Assert
        assert_eq!(toggled["eventsEnabled"], true);
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
    }

    // =============================================================================
    // BAD INPUT
    // =============================================================================

    #[tokio::test]
    async fn test_invalid_horizon_rejected() {
        // Arrange
        let env = running(Duration::from_secs(1)).await;

        // Act
        let (status, body) = env.generate(json!({ "forecastDays": 1000 })).await;

        // Assert
        assert_eq!(status, 400);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to generate forecast:"));
        assert_eq!(env.runtime.gateway().table().stats().snapshot().registered, 0);
    }

    // =============================================================================
    // OBSERVABILITY
    // =============================================================================

    #[tokio::test]
    async fn test_admin_stats_after_traffic() {
        // Arrange
        let env = running(Duration::from_secs(5)).await;
        env.generate(json!({})).await;

        // Act
        let pending: Value = env
            .client
            .get(format!("http://{}/pending", env.admin))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let stats: Value = env
            .client
            .get(format!("http://{}/stats", env.admin))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        // Assert
        assert_eq!(pending["count"], 0);
        assert_eq!(pending["stats"]["registered"], 1);
        assert_eq!(pending["stats"]["resolved"], 1);
        assert_eq!(stats["forecasts"]["completed"], 1);
        assert_eq!(stats["requests"]["total"], 1);
    }
}
