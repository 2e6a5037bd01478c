//! Process wiring and lifecycle.
//!
//! ## Startup Sequence
//!
//! 1. Create the message bus and the gateway on top of it
//! 2. Subscribe the response listener (and the dev responder, if enabled)
//! 3. Open the event gate when `events.enable_on_startup` is set
//! 4. Serve HTTP until shutdown is signalled
//!
//! ## Shutdown Sequence
//!
//! 1. Close the event gate so no new work is published
//! 2. Signal the servers and background tasks through the `watch` channel
//! 3. Close the bus

use crate::config::RuntimeConfig;
use crate::responder::DevForecastResponder;
use anyhow::{Context, Result};
use forecast_gateway::ForecastGatewayService;
use shared_bus::{InMemoryMessageBus, TopicFilter};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// The analytics runtime: bus, gateway and background consumers.
pub struct AnalyticsRuntime {
    config: RuntimeConfig,
    bus: Arc<InMemoryMessageBus>,
    gateway: ForecastGatewayService,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl AnalyticsRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        info!("Creating analytics runtime");

        let bus = Arc::new(
            InMemoryMessageBus::with_capacity(config.bus.capacity)
                .with_max_message_bytes(config.bus.max_message_bytes),
        );
        let gateway = ForecastGatewayService::new(config.gateway.clone(), bus.clone())
            .context("Failed to create forecast gateway")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            bus,
            gateway,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start background consumers and apply the startup gate policy.
    ///
    /// Must run inside a tokio runtime.
    pub fn start(&self) {
        let topics = &self.config.gateway.topics;

        let listener = self.gateway.response_listener();
        let subscription = self
            .bus
            .subscribe(TopicFilter::topic(topics.forecast_responses.as_str()));
        self.spawn_until_shutdown("forecast-listener", listener.run(subscription));

        if self.config.dev_responder {
            let responder =
                DevForecastResponder::new(self.bus.clone(), topics.forecast_responses.as_str());
            let subscription = self.bus.subscribe(TopicFilter::topic(topics.ml_events.as_str()));
            self.spawn_until_shutdown("dev-responder", responder.run(subscription));
            info!("Dev forecast responder enabled");
        }

        // Ready: listener is subscribed before anything can be published
        if self.config.gateway.events.enable_on_startup {
            self.gateway.gate().enable();
        } else {
            info!("Event publishing left disabled at startup");
        }
    }

    fn spawn_until_shutdown<F>(&self, task: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = future => {}
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!(task = task, "Shutdown signal received");
                }
            }
        });
    }

    /// Serve the gateway until [`shutdown`](Self::shutdown) is called
    pub async fn serve(&self) -> Result<()> {
        self.gateway
            .start(self.shutdown_rx.clone())
            .await
            .context("Forecast gateway failed")
    }

    /// Shut down gracefully
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        self.gateway.gate().disable();

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        self.bus.close();
    }

    pub fn gateway(&self) -> &ForecastGatewayService {
        &self.gateway
    }

    pub fn bus(&self) -> Arc<InMemoryMessageBus> {
        Arc::clone(&self.bus)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
