//! Pool reuse, clear, re-entrancy and lifecycle state

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tickbus_event_core::{
    CenterState, EventCenter, EventCenterConfig, EventContainer, EventPool, ReleaseOutcome,
};

#[derive(Debug, Clone, PartialEq)]
struct Spawned {
    name: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Despawned(u32);

#[test]
fn test_pool_reuses_containers_in_steady_state() {
    let config = EventCenterConfig::default().with_pool_sizes(2, 8);
    let center = EventCenter::new(config).unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = names.clone();
    center.subscribe(move |s: &Spawned| sink.lock().push(s.name.clone()));
    assert_eq!(center.pool().available::<Spawned>(), 2);

    for round in 0..10 {
        center.publish(Spawned {
            name: format!("unit-{}", round),
        });
        center.process_events();
    }

    let stats = center.stats();
    assert_eq!(stats.pool_misses, 0);
    assert_eq!(stats.pool_hits, 10);
    assert_eq!(center.pool().available::<Spawned>(), 2);
    assert_eq!(names.lock().len(), 10);
    assert_eq!(names.lock()[9], "unit-9");
}

#[test]
fn test_released_container_carries_no_payload() {
    let pool = EventPool::new(0, 4);
    let container = pool.acquire(Spawned { name: "a".into() }, 0);
    assert_eq!(pool.release(container), ReleaseOutcome::Pooled);

    let container = pool.acquire(Despawned(1), 0);
    assert_eq!(container.payload::<Despawned>(), Some(&Despawned(1)));
    assert_eq!(pool.available::<Spawned>(), 1);

    let reused = pool.acquire(Spawned { name: "b".into() }, 3);
    assert_eq!(reused.payload::<Spawned>().unwrap().name, "b");
    assert_eq!(reused.priority(), 3);
    assert_eq!(reused.use_count(), 2);
    assert!(!reused.is_disposed());
}

#[test]
fn test_release_of_disposed_container_is_ignored() {
    let pool = EventPool::new(0, 4);
    let mut container = EventContainer::new(Despawned(3), 0);
    container.dispose();
    assert_eq!(pool.release(container), ReleaseOutcome::AlreadyDisposed);
    assert_eq!(pool.total_available(), 0);
}

#[test]
fn test_pooling_disabled() {
    let config = EventCenterConfig::default().with_pooling(false);
    let center = EventCenter::new(config).unwrap();
    center.subscribe(|_: &Despawned| {});
    center.publish(Despawned(1));
    center.process_events();

    let stats = center.stats();
    assert_eq!(stats.pooled_events, 0);
    assert_eq!(stats.total_processed, 1);
}

#[test]
fn test_clear_twice_is_safe() {
    let center = EventCenter::default();
    let hits = Arc::new(Mutex::new(0));
    let sink = hits.clone();
    center.subscribe(move |_: &Despawned| *sink.lock() += 1);
    center.publish(Despawned(1));
    center.publish_with_priority(Despawned(2), 4);

    center.clear();
    center.clear();

    let stats = center.stats();
    assert_eq!(stats.queued_events, 0);
    assert_eq!(stats.active_subscriptions, 0);
    assert_eq!(center.state(), CenterState::Cleared);

    center.publish(Despawned(3));
    let report = center.process_events();
    assert_eq!(report.processed(), 1);
    assert_eq!(*hits.lock(), 0);
    assert_eq!(center.state(), CenterState::Initialized);
}

#[test]
fn test_clear_from_inside_listener() {
    let config = EventCenterConfig::default().with_pool_sizes(0, 8);
    let center = EventCenter::new(config).unwrap();
    let weak = center.downgrade();
    let log = Arc::new(Mutex::new(Vec::new()));

    let sink = log.clone();
    center.subscribe_with_priority(
        move |d: &Despawned| {
            sink.lock().push(format!("first:{}", d.0));
            if let Some(center) = weak.upgrade() {
                center.clear();
            }
        },
        10,
    );
    let sink = log.clone();
    center.subscribe(move |d: &Despawned| sink.lock().push(format!("second:{}", d.0)));

    center.publish(Despawned(1));
    center.publish(Despawned(2));
    let report = center.process_events();

    assert_eq!(report.processed(), 1);
    assert_eq!(*log.lock(), vec!["first:1"]);
    assert_eq!(center.pending_events(), 0);
    assert_eq!(center.state(), CenterState::Cleared);

    let stats = center.stats();
    assert_eq!(stats.active_subscriptions, 0);
    assert_eq!(stats.pooled_events, 0);
    assert_eq!(stats.total_processed, 0);
    assert_eq!(stats.tick_count, 0);
}

#[test]
fn test_nested_process_events_is_ignored() {
    let center = EventCenter::default();
    let weak = center.downgrade();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();

    center.subscribe(move |_: &Despawned| {
        if let Some(center) = weak.upgrade() {
            sink.lock().push(center.process_events());
        }
    });
    center.publish(Despawned(1));
    center.publish(Despawned(2));

    let report = center.process_events();
    assert!(!report.skipped_reentrant);
    assert_eq!(report.tick, 1);
    assert_eq!(report.processed(), 2);

    let nested = reports.lock();
    assert_eq!(nested.len(), 2);
    assert!(nested.iter().all(|r| r.skipped_reentrant && r.processed() == 0));
    assert_eq!(center.tick_count(), 1);
}

#[test]
fn test_state_transitions() {
    let center = EventCenter::default();
    assert_eq!(center.state(), CenterState::Initialized);

    let weak = center.downgrade();
    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    center.subscribe(move |_: &Despawned| {
        *sink.lock() = weak.upgrade().map(|c| c.state());
    });
    center.publish(Despawned(0));
    center.process_events();

    assert_eq!(*observed.lock(), Some(CenterState::Processing));
    assert_eq!(center.state(), CenterState::Initialized);

    center.clear();
    assert_eq!(center.state(), CenterState::Cleared);
    center.subscribe(|_: &Despawned| {});
    assert_eq!(center.state(), CenterState::Initialized);
}

#[test]
fn test_center_from_toml_config() {
    let config = EventCenterConfig::from_toml_str(
        r#"
        max_events_per_tick = 2
        max_batch_size = 1
        enable_logging = true
        "#,
    )
    .unwrap();
    let center = EventCenter::new(config).unwrap();
    assert_eq!(center.config().max_events_per_tick, 2);

    for i in 0..5 {
        center.publish(Despawned(i));
    }
    assert_eq!(center.process_events().normal, 2);
    assert_eq!(center.pending_events(), 3);
}

#[test]
fn test_stats_serialize_to_json() {
    let center = EventCenter::default();
    center.subscribe(|_: &Despawned| {});
    center.publish(Despawned(1));
    center.process_events();

    let json = center.stats().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["events_processed_this_tick"], 1);
    assert_eq!(value["active_subscriptions"], 1);
    assert_eq!(value["tick_count"], 1);
}
