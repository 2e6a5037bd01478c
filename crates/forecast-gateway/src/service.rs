//! Forecast gateway service - HTTP entry point.
//!
//! Provides the public forecasting API and a localhost admin API.

use crate::domain::config::GatewayConfig;
use crate::domain::error::{ForecastError, GatewayError};
use crate::domain::pending::{cleanup_task, CorrelationTable};
use crate::domain::types::{ForecastRequestDto, ForecastResponse};
use crate::ipc::{
    Correlator, EventGate, ForecastRequester, ForecastResponseListener, MlEventPublisher,
};
use crate::middleware::{create_cors_layer, track_requests, GatewayMetrics, TracingLayer};
use analytics_telemetry::{encode_metrics, PENDING_REQUESTS};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared_bus::MessagePublisher;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tracing::{error, info, warn};

/// Prefix of every forecast failure message returned to clients
const FAILURE_PREFIX: &str = "Failed to generate forecast";

/// Forecast gateway service
pub struct ForecastGatewayService {
    config: GatewayConfig,
    table: Arc<CorrelationTable<ForecastResponse>>,
    gate: Arc<EventGate>,
    publisher: Arc<MlEventPublisher>,
    requester: ForecastRequester,
    metrics: Arc<GatewayMetrics>,
}

impl ForecastGatewayService {
    /// Wire the gateway onto a bus. The event gate starts closed.
    pub fn new(config: GatewayConfig, bus: Arc<dyn MessagePublisher>) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let table = Arc::new(CorrelationTable::new());
        let gate = Arc::new(EventGate::new());
        let publisher = Arc::new(MlEventPublisher::new(
            bus,
            Arc::clone(&gate),
            config.topics.ml_events.clone(),
        ));
        let correlator = Correlator::new(Arc::clone(&table), config.correlation.wait_timeout);
        let requester = ForecastRequester::new(correlator, Arc::clone(&publisher));

        Ok(Self {
            config,
            table,
            gate,
            publisher,
            requester,
            metrics: Arc::new(GatewayMetrics::new()),
        })
    }

    /// Listener resolving this gateway's pending requests
    pub fn response_listener(&self) -> ForecastResponseListener {
        ForecastResponseListener::new(Arc::clone(&self.table))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn gate(&self) -> Arc<EventGate> {
        Arc::clone(&self.gate)
    }

    /// Publisher for domain events (customers, orders, initial data)
    pub fn publisher(&self) -> Arc<MlEventPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn requester(&self) -> ForecastRequester {
        self.requester.clone()
    }

    pub fn table(&self) -> Arc<CorrelationTable<ForecastResponse>> {
        Arc::clone(&self.table)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Serve until `shutdown` flips to true.
    ///
    /// Also runs the pending-request sweeper for the lifetime of the servers.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), GatewayError> {
        info!("Starting forecast gateway...");

        let http_addr = self.config.http_addr();
        let http_listener = bind(http_addr).await?;
        info!(addr = %http_addr, "Starting HTTP server");

        let admin_listener = if self.config.admin.enabled {
            let admin_addr = self.config.admin_addr();
            let listener = bind(admin_addr).await?;
            info!(addr = %admin_addr, "Starting Admin server");
            Some(listener)
        } else {
            None
        };

        let sweeper = tokio::spawn(cleanup_task(
            Arc::clone(&self.table),
            self.config.correlation.sweep_interval,
            self.config.correlation.entry_ttl,
        ));

        let admin_handle = admin_listener.map(|listener| {
            let router = self.admin_router();
            let mut admin_shutdown = shutdown.clone();
            tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.wait_for(|stop| *stop).await;
                    })
                    .await
            })
        });

        info!("Forecast gateway started");

        let result = axum::serve(http_listener, self.http_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
                info!("Received shutdown signal");
            })
            .await;

        sweeper.abort();
        if let Some(handle) = admin_handle {
            match handle.await {
                Ok(Err(e)) => warn!(error = %e, "Admin server error"),
                Err(e) => warn!(error = %e, "Admin server task failed"),
                Ok(Ok(())) => {}
            }
        }

        if let Err(e) = result {
            error!(error = %e, "HTTP server error");
            return Err(GatewayError::Server(e.to_string()));
        }

        info!("Forecast gateway stopped");
        Ok(())
    }

    /// Build the public router
    pub fn http_router(&self) -> Router {
        let state = AppState {
            requester: self.requester.clone(),
            gate: Arc::clone(&self.gate),
            table: Arc::clone(&self.table),
            metrics: Arc::clone(&self.metrics),
        };

        let middleware = ServiceBuilder::new()
            .layer(create_cors_layer(&self.config.cors))
            .layer(TracingLayer::new())
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&self.metrics),
                track_requests,
            ));

        Router::new()
            .route("/api/forecasting/generate", post(generate_forecast))
            .route("/health", get(health_check))
            .layer(middleware)
            .with_state(state)
    }

    /// Build the admin router
    pub fn admin_router(&self) -> Router {
        let state = AppState {
            requester: self.requester.clone(),
            gate: Arc::clone(&self.gate),
            table: Arc::clone(&self.table),
            metrics: Arc::clone(&self.metrics),
        };

        Router::new()
            .route("/health", get(health_check))
            .route("/pending", get(pending_stats))
            .route("/stats", get(gateway_stats))
            .route("/metrics", get(prometheus_metrics))
            .route("/events/enable", post(enable_events))
            .route("/events/disable", post(disable_events))
            .layer(TracingLayer::new())
            .with_state(state)
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    requester: ForecastRequester,
    gate: Arc<EventGate>,
    table: Arc<CorrelationTable<ForecastResponse>>,
    metrics: Arc<GatewayMetrics>,
}

/// HTTP status for a failed forecast
pub fn status_for(error: &ForecastError) -> StatusCode {
    match error {
        ForecastError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        ForecastError::SendFailed(_) => StatusCode::BAD_GATEWAY,
        ForecastError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ForecastError::NotRegistered(_) | ForecastError::DuplicateId(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn failure_response(status: StatusCode, reason: impl std::fmt::Display) -> Response {
    let body = ForecastResponse::failure(format!("{FAILURE_PREFIX}: {reason}"));
    (status, Json(body)).into_response()
}

/// `POST /api/forecasting/generate`
async fn generate_forecast(
    State(state): State<AppState>,
    body: Result<Json<ForecastRequestDto>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected forecast request body");
            return failure_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state.requester.request_forecast(request).await {
        Ok(response) => {
            state.metrics.record_forecast_completed();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            state
                .metrics
                .record_forecast_failed(matches!(e, ForecastError::TimedOut(_)));
            failure_response(status_for(&e), &e)
        }
    }
}

/// `GET /health`
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "eventsEnabled": state.gate.is_enabled(),
        "pending": state.table.len(),
    }))
}

/// `GET /pending`
async fn pending_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "count": state.table.len(),
        "stats": state.table.stats().snapshot(),
    }))
}

/// `GET /stats`
async fn gateway_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

/// `GET /metrics`
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    PENDING_REQUESTS.set(state.table.len() as f64);
    match encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// `POST /events/enable`
async fn enable_events(State(state): State<AppState>) -> impl IntoResponse {
    state.gate.enable();
    Json(json!({ "eventsEnabled": state.gate.is_enabled() }))
}

/// `POST /events/disable`
async fn disable_events(State(state): State<AppState>) -> impl IntoResponse {
    state.gate.disable();
    Json(json!({ "eventsEnabled": state.gate.is_enabled() }))
}
