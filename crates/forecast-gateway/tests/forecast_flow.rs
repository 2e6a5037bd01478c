//! # Forecast Flow Tests
//!
//! End-to-end register → publish → resolve flows over the in-memory bus,
//! and the HTTP surface served on a real socket.

use forecast_gateway::{
    Correlator, CorrelationError, CorrelationId, CorrelationTable, ForecastError,
    ForecastGatewayService, ForecastRequestDto, ForecastResponse, ForecastResponseListener,
    GatewayConfig, ListenerOutcome, MlEvent, MlEventType,
};
use serde_json::json;
use shared_bus::{BusMessage, InMemoryMessageBus, MessagePublisher, TopicFilter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn gateway(wait: Duration) -> (Arc<InMemoryMessageBus>, ForecastGatewayService) {
    let mut config = GatewayConfig::default();
    config.correlation.wait_timeout = wait;

    let bus = Arc::new(InMemoryMessageBus::new());
    let service = ForecastGatewayService::new(config, bus.clone()).unwrap();
    tokio::spawn(
        service
            .response_listener()
            .run(bus.subscribe(TopicFilter::topic("forecast-responses"))),
    );
    (bus, service)
}

/// Fake engine: replies to every forecast request after `delay`
fn spawn_engine(bus: Arc<InMemoryMessageBus>, delay: Duration) {
    let mut requests = bus.subscribe(TopicFilter::topic("ml-events"));
    tokio::spawn(async move {
        while let Some(message) = requests.recv().await {
            let event: MlEvent = serde_json::from_slice(&message.payload).unwrap();
            if event.event_type != MlEventType::ForecastRequested {
                continue;
            }
            let key = message.key().unwrap().to_string();
            let days = event.data["forecastDays"].as_u64().unwrap();
            let reply = json!({
                "success": true,
                "bestModel": "ARIMA",
                "summary": { "forecastHorizonDays": days },
                "processingTimeMs": 12.7,
            });
            let bus = bus.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                bus.send(BusMessage::keyed(
                    "forecast-responses",
                    key,
                    serde_json::to_vec(&reply).unwrap(),
                ))
                .await
                .unwrap();
            });
        }
    });
}

async fn serve(service: &ForecastGatewayService) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = service.http_router();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    addr
}

// =============================================================================
// CORRELATION SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_req_42_resolved_after_delay() {
    let (bus, service) = gateway(Duration::from_secs(2));
    service.gate().enable();
    spawn_engine(bus, Duration::from_millis(100));

    let response = service
        .requester()
        .request_forecast_with(
            CorrelationId::from("req-42"),
            ForecastRequestDto::default(),
            Duration::from_secs(2),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.best_model.as_deref(), Some("ARIMA"));
    assert_eq!(response.processing_time_ms, Some(12));
    assert!(!service.table().contains(&CorrelationId::from("req-42")));
}

#[tokio::test]
async fn test_req_7_times_out_and_is_removed() {
    let table = Arc::new(CorrelationTable::<ForecastResponse>::new());
    let correlator = Correlator::new(table.clone(), Duration::from_secs(30));
    let id = CorrelationId::from("req-7");

    correlator.register_pending_request(&id).unwrap();
    let result = correlator
        .wait_for_result(&id, Duration::from_millis(200))
        .await;

    assert!(matches!(result, Err(CorrelationError::TimedOut { .. })));
    assert_eq!(table.len(), 0);
}

#[tokio::test]
async fn test_req_99_orphan_is_dropped() {
    let table = Arc::new(CorrelationTable::<ForecastResponse>::new());
    let listener = ForecastResponseListener::new(table.clone());

    let outcome = listener.on_message(&BusMessage::keyed(
        "forecast-responses",
        "req-99",
        br#"{"success":true}"#.to_vec(),
    ));

    assert_eq!(outcome, ListenerOutcome::Orphaned);
    assert!(table.is_empty());
    assert_eq!(table.stats().snapshot().orphaned, 1);
}

#[tokio::test]
async fn test_immediate_resolution_is_not_lost() {
    let table = Arc::new(CorrelationTable::<ForecastResponse>::new());
    let correlator = Correlator::new(table.clone(), Duration::from_secs(1));
    let id = CorrelationId::from("fast");

    correlator.register_pending_request(&id).unwrap();
    // Response lands before anyone waits
    assert!(table.resolve(&id, ForecastResponse::failure("already done")));

    let value = correlator.wait(&id).await.unwrap();
    assert_eq!(value.error.as_deref(), Some("already done"));
    assert!(table.is_empty());
}

#[tokio::test]
async fn test_disabled_gate_never_reaches_transport() {
    let (bus, service) = gateway(Duration::from_millis(150));
    spawn_engine(bus.clone(), Duration::ZERO);

    let result = service
        .requester()
        .request_forecast(ForecastRequestDto::default())
        .await;

    assert!(matches!(result, Err(ForecastError::TimedOut(_))));
    assert_eq!(bus.messages_published(), 0);
    assert!(service.table().is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_get_their_own_response() {
    let (bus, service) = gateway(Duration::from_secs(2));
    service.gate().enable();
    spawn_engine(bus, Duration::from_millis(20));

    let handles: Vec<_> = (1..=8u32)
        .map(|days| {
            let requester = service.requester();
            tokio::spawn(async move {
                let request = ForecastRequestDto {
                    forecast_days: days,
                    ..ForecastRequestDto::default()
                };
                (days, requester.request_forecast(request).await.unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (days, response) = handle.await.unwrap();
        assert_eq!(response.summary.unwrap().forecast_horizon_days, days);
    }
    assert!(service.table().is_empty());
}

// =============================================================================
// HTTP SURFACE
// =============================================================================

#[tokio::test]
async fn test_http_generate_round_trip() {
    let (bus, service) = gateway(Duration::from_secs(2));
    service.gate().enable();
    spawn_engine(bus, Duration::from_millis(50));
    let addr = serve(&service).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/forecasting/generate"))
        .json(&json!({ "forecastDays": 14, "requestId": "client-chosen" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["forecastHorizonDays"], 14);
}

#[tokio::test]
async fn test_http_timeout_is_gateway_timeout() {
    let (_bus, service) = gateway(Duration::from_millis(100));
    service.gate().enable();
    let addr = serve(&service).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/forecasting/generate"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::GATEWAY_TIMEOUT);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to generate forecast:"));
    assert!(service.table().is_empty());
}

#[tokio::test]
async fn test_http_health_reports_gate() {
    let (_bus, service) = gateway(Duration::from_secs(1));
    service.gate().enable();
    let addr = serve(&service).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["eventsEnabled"], true);
}
