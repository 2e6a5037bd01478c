//! # Integration Test Flows
//!
//! Tests that the gated ML event publisher, the in-memory bus and the
//! forecast response listener work together.
//!
//! ## Flows Tested:
//!
//! 1. **Domain events → ml-events**: customer, order and initial-data events
//!    reach an engine subscriber keyed by customer id
//! 2. **Event gate**: a closed gate keeps every publish off the transport
//! 3. **Response routing**: late, duplicate and misrouted responses never
//!    disturb a waiting request

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use async_trait::async_trait;
    use forecast_gateway::{
        CorrelationId, CorrelationTable, Correlator, EventGate, ForecastError, ForecastRequestDto,
        ForecastRequester, ForecastResponse, ForecastResponseListener, MlEvent, MlEventPublisher,
        MlEventType,
    };
    use serde_json::json;
    use shared_bus::{
        BusError, BusMessage, DeliveryReceipt, InMemoryMessageBus, MessagePublisher, Subscription,
        TopicFilter,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Forwards to the in-memory bus and counts every send attempt
    struct CountingBus {
        inner: Arc<InMemoryMessageBus>,
        sends: AtomicU64,
    }

    impl CountingBus {
        fn new(inner: Arc<InMemoryMessageBus>) -> Self {
            Self {
                inner,
                sends: AtomicU64::new(0),
            }
        }

        fn sends(&self) -> u64 {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessagePublisher for CountingBus {
        async fn send(&self, message: BusMessage) -> Result<DeliveryReceipt, BusError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.inner.send(message).await
        }

        fn messages_published(&self) -> u64 {
            self.inner.messages_published()
        }
    }

    struct Fixture {
        bus: Arc<InMemoryMessageBus>,
        counting: Arc<CountingBus>,
        gate: Arc<EventGate>,
        publisher: Arc<MlEventPublisher>,
        table: Arc<CorrelationTable<ForecastResponse>>,
        engine: Subscription,
    }

    fn fixture(gate_open: bool) -> Fixture {
        let bus = Arc::new(InMemoryMessageBus::new());
        let counting = Arc::new(CountingBus::new(bus.clone()));
        let gate = Arc::new(EventGate::with_state(gate_open));
        let publisher = Arc::new(MlEventPublisher::new(
            counting.clone(),
            gate.clone(),
            "ml-events",
        ));
        let table = Arc::new(CorrelationTable::new());

        let listener = ForecastResponseListener::new(table.clone());
        tokio::spawn(listener.run(bus.subscribe(TopicFilter::topic("forecast-responses"))));
        let engine = bus.subscribe(TopicFilter::topic("ml-events"));

        Fixture {
            bus,
            counting,
            gate,
            publisher,
            table,
            engine,
        }
    }

    async fn next_event(engine: &mut Subscription) -> (Option<String>, MlEvent) {
        let message = timeout(Duration::from_secs(1), engine.recv())
            .await
            .expect("event in time")
            .expect("bus open");
        let event = serde_json::from_slice(&message.payload).expect("valid event");
        (message.key, event)
    }

    async fn reply(bus: &InMemoryMessageBus, key: &str, body: serde_json::Value) {
        bus.send(BusMessage::keyed(
            "forecast-responses",
            key,
            serde_json::to_vec(&body).unwrap(),
        ))
        .await
        .unwrap();
    }

    async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..50 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    // =============================================================================
    // INTEGRATION TESTS: DOMAIN EVENTS → ML EVENTS TOPIC
    // =============================================================================

    #[tokio::test]
    async fn test_domain_events_reach_engine() {
        // Arrange
        let mut f = fixture(true);

        // Act
        f.publisher.publish_customer_created(42).await;
        f.publisher.publish_order_created(42, 7).await;
        f.publisher.publish_initial_data_generated().await;

        // Assert
        let (key, event) = next_event(&mut f.engine).await;
        assert_eq!(key.as_deref(), Some("42"));
        assert_eq!(event.event_type, MlEventType::CustomerCreated);
        assert!(event.data.is_null());

        let (key, event) = next_event(&mut f.engine).await;
        assert_eq!(key.as_deref(), Some("42"));
        assert_eq!(event.event_type, MlEventType::OrderCreated);
        assert_eq!(event.data, json!(7));

        let (key, event) = next_event(&mut f.engine).await;
        assert_eq!(key.as_deref(), Some("0"));
        assert_eq!(event.event_type, MlEventType::InitialDataGenerated);
        assert_eq!(event.customer_id, 0);
    }

    #[tokio::test]
    async fn test_closed_gate_never_reaches_transport() {
        // Arrange
        let mut f = fixture(false);

        // Act
        f.publisher.publish_customer_updated(1).await;
        f.publisher.publish_order_updated(1, 2).await;
        f.publisher.publish_initial_data_generated().await;
        let ack = f
            .publisher
            .publish_forecast_request(
                &ForecastRequestDto::default().with_request_id(&CorrelationId::from("gated")),
            )
            .await;

        // Assert
        assert!(ack.is_ok());
        assert_eq!(f.counting.sends(), 0);
        assert!(matches!(f.engine.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_gate_toggle_takes_effect_on_next_publish() {
        // Arrange
        let mut f = fixture(true);

        // Act
        f.publisher.publish_customer_created(1).await;
        f.gate.disable();
        f.publisher.publish_customer_created(2).await;
        f.gate.enable();
        f.publisher.publish_customer_created(3).await;

        // Assert
        assert_eq!(f.counting.sends(), 2);
        assert_eq!(next_event(&mut f.engine).await.1.customer_id, 1);
        assert_eq!(next_event(&mut f.engine).await.1.customer_id, 3);
    }

    // =============================================================================
    // INTEGRATION TESTS: RESPONSE ROUTING
    // =============================================================================

    #[tokio::test]
    async fn test_late_response_is_orphaned() {
        // Arrange
        let f = fixture(true);
        let correlator = Correlator::new(f.table.clone(), Duration::from_millis(100));
        let requester = ForecastRequester::new(correlator, f.publisher.clone());

        // Act: nobody answers in time
        let result = requester
            .request_forecast_with(
                CorrelationId::from("slow"),
                ForecastRequestDto::default(),
                Duration::from_millis(100),
            )
            .await;
        reply(&f.bus, "slow", json!({"success": true})).await;

        // Assert
        assert!(matches!(result, Err(ForecastError::TimedOut(_))));
        let table = f.table.clone();
        assert!(eventually(move || table.stats().snapshot().orphaned == 1).await);
        assert!(f.table.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_response_first_wins() {
        // Arrange
        let f = fixture(true);
        let correlator = Correlator::new(f.table.clone(), Duration::from_secs(2));
        let requester = ForecastRequester::new(correlator, f.publisher.clone());
        let bus = f.bus.clone();
        let mut engine = f.engine;
        tokio::spawn(async move {
            let message = engine.recv().await.unwrap();
            let key = message.key.unwrap();
            reply(&bus, &key, json!({"success": true, "bestModel": "first"})).await;
            reply(&bus, &key, json!({"success": true, "bestModel": "second"})).await;
        });

        // Act
        let response = requester
            .request_forecast(ForecastRequestDto::default())
            .await
            .unwrap();

        // Assert
        assert_eq!(response.best_model.as_deref(), Some("first"));
        let table = f.table.clone();
        assert!(
            eventually(move || {
                let stats = table.stats().snapshot();
                stats.orphaned + stats.duplicate_resolutions == 1
            })
            .await
        );
        assert_eq!(f.table.stats().snapshot().resolved, 1);
    }

    #[tokio::test]
    async fn test_response_on_other_topic_is_ignored() {
        // Arrange
        let f = fixture(true);
        let correlator = Correlator::new(f.table.clone(), Duration::from_millis(200));
        let id = CorrelationId::from("req-misrouted");
        correlator.register_pending_request(&id).unwrap();

        // Act
        f.bus
            .send(BusMessage::keyed(
                "ml-events",
                id.as_str(),
                br#"{"success":true}"#.to_vec(),
            ))
            .await
            .unwrap();
        let result = correlator.wait(&id).await;

        // Assert
        assert!(result.is_err());
        assert!(f.table.is_empty());
    }
}
