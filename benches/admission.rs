// Admission Path Benchmarks
//
// Key metrics:
// - Grant on a lightly loaded resource
// - Denial with wait estimation over a full window of history
// - Wait estimation alone

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use quota_broker::quota::{
    estimate_wait, AdmissionCoordinator, ConsumptionEvent, ManualClock, ModelName, Resource,
    ResourceCatalog,
};
use std::hint::black_box;
use std::sync::Arc;

const MODEL: ModelName = ModelName::Embedding3Small;

fn coordinator(capacity: u64) -> (AdmissionCoordinator, Arc<ManualClock>) {
    let catalog = Arc::new(ResourceCatalog::new().with_model(
        MODEL,
        vec![
            Resource::with_capacity("east", capacity),
            Resource::with_capacity("west", capacity),
        ],
    ));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 10, 10, 0, 0, 0).unwrap(),
    ));
    (
        AdmissionCoordinator::with_clock(catalog, clock.clone()),
        clock,
    )
}

/// Benchmark: grant with the clock moving so events keep expiring
fn bench_grant(c: &mut Criterion) {
    let (coord, clock) = coordinator(u64::MAX / 2);
    c.bench_function("admission_grant", |b| {
        b.iter(|| {
            clock.advance(Duration::milliseconds(10));
            black_box(coord.request_quota(MODEL, black_box(1_000)).unwrap());
        });
    });
}

/// Benchmark: denial on saturated resources
fn bench_denied(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission_denied");
    for events in [10u64, 100, 1_000] {
        let (coord, clock) = coordinator(events * 100);
        for _ in 0..events * 2 {
            let _ = coord.request_quota(MODEL, 100);
            clock.advance(Duration::milliseconds(1));
        }
        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, _| {
            b.iter(|| black_box(coord.request_quota(MODEL, black_box(500)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark: wait estimation alone
fn bench_estimate_wait(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2024, 10, 10, 0, 1, 0).unwrap();
    let events: Vec<ConsumptionEvent> = (0..1_000)
        .map(|i| ConsumptionEvent {
            resource: "east".to_string(),
            tokens: 100,
            // reverse order so the sort does work
            timestamp: now - Duration::milliseconds(i * 50),
        })
        .collect();

    c.bench_function("estimate_wait_1000_events", |b| {
        b.iter(|| black_box(estimate_wait(black_box(&events), 50_000, 0, now)));
    });
}

criterion_group!(benches, bench_grant, bench_denied, bench_estimate_wait);
criterion_main!(benches);
