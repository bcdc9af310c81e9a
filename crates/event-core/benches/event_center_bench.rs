use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickbus_event_core::{EventCenter, EventCenterConfig};

// --- Common benchmark configuration ---
const EVENT_COUNT: usize = 10000;
const BENCH_MEASUREMENT_TIME: Duration = Duration::from_secs(10);
const BENCH_SAMPLE_SIZE: usize = 50;
const SUBSCRIBER_COUNTS: [usize; 4] = [1, 10, 100, 1000];

// Sample event for benchmarking
#[derive(Clone, Debug)]
struct TestEvent {
    pub id: u64,
    pub data: String,
}

#[derive(Clone, Copy, Debug)]
struct SmallEvent {
    pub id: u64,
}

fn create_center(pooling: bool) -> EventCenter {
    let config = EventCenterConfig::default()
        .with_max_events_per_tick(EVENT_COUNT)
        .with_pool_sizes(64, 1024)
        .with_pooling(pooling);
    EventCenter::new(config).unwrap()
}

/// Publish a tick's worth of events and drain them, per listener count
fn bench_publish_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_process");
    group.measurement_time(BENCH_MEASUREMENT_TIME);
    group.sample_size(BENCH_SAMPLE_SIZE);

    for &num_subscribers in &SUBSCRIBER_COUNTS {
        group.throughput(Throughput::Elements(EVENT_COUNT as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_subscribers),
            &num_subscribers,
            |b, &n| {
                let center = create_center(true);
                let counter = Arc::new(AtomicU64::new(0));
                for priority in 0..n {
                    let counter = counter.clone();
                    center.subscribe_with_priority(
                        move |event: &TestEvent| {
                            black_box((event.id, event.data.len()));
                            counter.fetch_add(1, Ordering::Relaxed);
                        },
                        priority as i32,
                    );
                }

                b.iter(|| {
                    for i in 0..EVENT_COUNT {
                        center.publish(TestEvent {
                            id: i as u64,
                            data: String::new(),
                        });
                    }
                    black_box(center.process_events());
                });
            },
        );
    }

    group.finish();
}

/// Pooled versus unpooled containers on the hot path
fn bench_pooling(c: &mut Criterion) {
    let mut group = c.benchmark_group("pooling");
    group.throughput(Throughput::Elements(EVENT_COUNT as u64));

    for pooling in [true, false] {
        group.bench_with_input(BenchmarkId::from_parameter(pooling), &pooling, |b, &pooling| {
            let center = create_center(pooling);
            center.subscribe(|event: &SmallEvent| {
                black_box(event.id);
            });

            b.iter(|| {
                for i in 0..EVENT_COUNT {
                    center.publish(SmallEvent { id: i as u64 });
                }
                black_box(center.process_events());
            });
        });
    }

    group.finish();
}

/// Synchronous dispatch without queueing
fn bench_publish_immediate(c: &mut Criterion) {
    let center = create_center(true);
    for priority in 0..10 {
        center.subscribe_with_priority(
            |event: &SmallEvent| {
                black_box(event.id);
            },
            priority,
        );
    }

    c.bench_function("publish_immediate_10_listeners", |b| {
        let mut id = 0;
        b.iter(|| {
            id += 1;
            black_box(center.publish_immediate(SmallEvent { id }));
        });
    });
}

criterion_group!(
    benches,
    bench_publish_process,
    bench_pooling,
    bench_publish_immediate
);
criterion_main!(benches);
