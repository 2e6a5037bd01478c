//! # Correlation Benchmarks
//!
//! | Path | Operation |
//! |------|-----------|
//! | Correlation table | register + resolve + claim + remove |
//! | Correlation table | resolve of an unknown id (orphan) |
//! | Full round trip | register → publish → engine reply → resolve → wait |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forecast_gateway::{
    CorrelationId, CorrelationTable, Correlator, EventGate, ForecastRequestDto, ForecastRequester,
    ForecastResponseListener, MlEvent, MlEventPublisher,
};
use shared_bus::{BusMessage, InMemoryMessageBus, MessagePublisher, TopicFilter};
use std::sync::Arc;
use std::time::Duration;

fn bench_table_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-table");

    let table = CorrelationTable::<u64>::new();
    let mut n = 0u64;
    group.bench_function("register_resolve_claim_remove", |b| {
        b.iter(|| {
            n += 1;
            let id = CorrelationId::from(format!("bench-{n}"));
            table.register(id.clone()).ok();
            black_box(table.resolve(&id, n));
            let received = table.claim(&id).and_then(|mut rx| rx.try_recv().ok());
            table.remove(&id);
            black_box(received)
        })
    });

    let orphan = CorrelationId::from("nobody-waits");
    group.bench_function("resolve_orphan", |b| {
        b.iter(|| black_box(table.resolve(&orphan, 0)))
    });

    // Lookups against a populated table
    for size in [100usize, 10_000] {
        let populated = CorrelationTable::<u64>::new();
        for i in 0..size {
            populated.register(CorrelationId::from(format!("held-{i}"))).ok();
        }
        let needle = CorrelationId::from(format!("held-{}", size / 2));
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("contains", size), &size, |b, _| {
            b.iter(|| black_box(populated.contains(&needle)))
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("forecast-round-trip");
    group.measurement_time(Duration::from_secs(10));

    let requester = runtime.block_on(async {
        let bus = Arc::new(InMemoryMessageBus::new());
        let table = Arc::new(CorrelationTable::new());
        let gate = Arc::new(EventGate::with_state(true));
        let publisher = Arc::new(MlEventPublisher::new(bus.clone(), gate, "ml-events"));

        tokio::spawn(
            ForecastResponseListener::new(table.clone())
                .run(bus.subscribe(TopicFilter::topic("forecast-responses"))),
        );

        // Instant engine
        let mut requests = bus.subscribe(TopicFilter::topic("ml-events"));
        let engine_bus = bus.clone();
        tokio::spawn(async move {
            while let Some(message) = requests.recv().await {
                let Ok(event) = serde_json::from_slice::<MlEvent>(&message.payload) else {
                    continue;
                };
                let Some(key) = event.data["requestId"].as_str() else {
                    continue;
                };
                let reply = BusMessage::keyed(
                    "forecast-responses",
                    key,
                    br#"{"success":true,"bestModel":"bench"}"#.to_vec(),
                );
                engine_bus.send(reply).await.ok();
            }
        });

        ForecastRequester::new(Correlator::new(table, Duration::from_secs(5)), publisher)
    });

    group.bench_function("request_forecast", |b| {
        b.to_async(&runtime).iter(|| {
            let requester = requester.clone();
            async move {
                black_box(
                    requester
                        .request_forecast(ForecastRequestDto::default())
                        .await
                        .is_ok(),
                )
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_table_lifecycle, bench_round_trip);
criterion_main!(benches);
