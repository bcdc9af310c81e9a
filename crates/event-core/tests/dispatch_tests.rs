//! Listener ordering, failure isolation and registry mutation during dispatch

use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tickbus_event_core::{EventCenter, EventListener, ListenerId, SubscriptionHandle};

#[derive(Debug, Clone, PartialEq)]
struct Damaged {
    amount: i32,
}

#[derive(Debug, Clone, PartialEq)]
struct Healed {
    amount: i32,
}

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &Log, name: &'static str) -> impl Fn(&Damaged) + Send + Sync + 'static {
    let log = log.clone();
    move |event: &Damaged| log.lock().push(format!("{}:{}", name, event.amount))
}

#[test]
fn test_priority_order_regardless_of_registration_order() {
    let center = EventCenter::default();
    let log = new_log();

    center.subscribe_with_priority(record(&log, "p2"), 5);
    center.subscribe_with_priority(record(&log, "p3"), -1);
    center.subscribe_with_priority(record(&log, "p1"), 10);

    center.publish(Damaged { amount: 1 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["p1:1", "p2:1", "p3:1"]);
}

#[test]
fn test_equal_priorities_keep_subscription_order() {
    let center = EventCenter::default();
    let log = new_log();

    center.subscribe(record(&log, "first"));
    center.subscribe_with_priority(record(&log, "high"), 3);
    center.subscribe(record(&log, "second"));
    center.subscribe(record(&log, "third"));

    center.publish(Damaged { amount: 2 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["high:2", "first:2", "second:2", "third:2"]);
}

#[test]
fn test_damaged_scenario() {
    let center = EventCenter::default();
    let log = new_log();

    center.subscribe_with_priority(record(&log, "A"), 10);
    center.subscribe_with_priority(record(&log, "B"), 5);

    center.publish(Damaged { amount: 3 });
    center.publish(Damaged { amount: 7 });
    let report = center.process_events();

    assert_eq!(report.normal, 2);
    assert_eq!(*log.lock(), vec!["A:3", "B:3", "A:7", "B:7"]);
}

#[test]
fn test_types_are_routed_independently() {
    let center = EventCenter::default();
    let log = new_log();
    let heal_log = log.clone();

    center.subscribe(record(&log, "damage"));
    center.subscribe(move |e: &Healed| heal_log.lock().push(format!("heal:{}", e.amount)));

    center.publish(Healed { amount: 4 });
    center.publish(Damaged { amount: 1 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["heal:4", "damage:1"]);
    assert_eq!(center.listener_count::<Damaged>(), 1);
    assert_eq!(center.listener_count::<Healed>(), 1);
    assert!(!center.is_registered::<String>());
}

#[test]
fn test_panicking_listener_does_not_stop_dispatch() {
    let center = EventCenter::default();
    let log = new_log();

    center.subscribe_with_priority(record(&log, "before"), 10);
    center.subscribe_with_priority(
        |e: &Damaged| {
            if e.amount == 1 {
                panic!("cannot handle {}", e.amount);
            }
        },
        5,
    );
    center.subscribe_with_priority(record(&log, "after"), 1);

    assert_eq!(center.publish_immediate(Damaged { amount: 1 }), 3);
    center.publish(Damaged { amount: 2 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["before:1", "after:1", "before:2", "after:2"]);
    let stats = center.stats();
    assert_eq!(stats.listener_failures, 1);

    let failure = center.last_listener_failure().unwrap();
    assert_eq!(failure.message, "panicked: cannot handle 1");
    assert_eq!(failure.event_type.short_name(), "Damaged");
}

struct Armor {
    absorbed: Mutex<i32>,
}

impl EventListener<Damaged> for Armor {
    fn handle_event(&self, event: &Damaged) -> anyhow::Result<()> {
        if event.amount < 0 {
            bail!("negative damage {}", event.amount);
        }
        *self.absorbed.lock() += event.amount;
        Ok(())
    }

    fn listener_name(&self) -> &str {
        "armor"
    }
}

impl EventListener<Healed> for Armor {
    fn handle_event(&self, event: &Healed) -> anyhow::Result<()> {
        *self.absorbed.lock() -= event.amount;
        Ok(())
    }
}

#[test]
fn test_listener_object_errors_are_isolated() {
    let center = EventCenter::default();
    let armor = Arc::new(Armor {
        absorbed: Mutex::new(0),
    });
    let log = new_log();

    center.subscribe_listener::<Damaged, _>(&armor, 10);
    center.subscribe(record(&log, "hud"));

    center.publish(Damaged { amount: -2 });
    center.publish(Damaged { amount: 5 });
    center.process_events();

    assert_eq!(*armor.absorbed.lock(), 5);
    assert_eq!(*log.lock(), vec!["hud:-2", "hud:5"]);

    let failure = center.last_listener_failure().unwrap();
    assert_eq!(failure.callback, "armor");
    assert_eq!(failure.message, "negative damage -2");
    assert_eq!(failure.listener, ListenerId::of(&armor));
}

#[test]
fn test_unsubscribe_listener_removes_all_its_types() {
    let center = EventCenter::default();
    let armor = Arc::new(Armor {
        absorbed: Mutex::new(0),
    });

    center.subscribe_listener::<Damaged, _>(&armor, 0);
    center.subscribe_listener::<Healed, _>(&armor, 0);
    center.subscribe(|_: &Damaged| {});
    assert_eq!(center.stats().active_subscriptions, 3);

    assert_eq!(center.unsubscribe_listener(&armor), 2);
    assert_eq!(center.stats().active_subscriptions, 1);
    assert_eq!(center.unsubscribe_listener(&armor), 0);
}

#[test]
fn test_subscribe_as_groups_closures() {
    let center = EventCenter::default();
    let owner = ListenerId::new();

    center.subscribe_as(owner, |_: &Damaged| {}, 0);
    center.subscribe_as(owner, |_: &Healed| {}, 0);
    center.subscribe(|_: &Healed| {});

    assert_eq!(center.unsubscribe_all(owner), 2);
    assert!(!center.is_registered::<Damaged>());
    assert_eq!(center.listener_count::<Healed>(), 1);
}

#[test]
fn test_unsubscribe_during_dispatch_skips_later_listener() {
    let center = EventCenter::default();
    let log = new_log();
    let victim: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

    let weak = center.downgrade();
    let target = victim.clone();
    let l1_log = log.clone();
    center.subscribe_with_priority(
        move |e: &Damaged| {
            l1_log.lock().push(format!("L1:{}", e.amount));
            if let (Some(center), Some(handle)) = (weak.upgrade(), target.lock().take()) {
                assert!(center.unsubscribe(&handle));
            }
        },
        10,
    );
    *victim.lock() = Some(center.subscribe_with_priority(record(&log, "L2"), 5));

    center.publish(Damaged { amount: 1 });
    center.publish(Damaged { amount: 2 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["L1:1", "L1:2"]);
    assert_eq!(center.listener_count::<Damaged>(), 1);
}

#[test]
fn test_subscribe_during_dispatch_applies_to_next_event() {
    let center = EventCenter::default();
    let log = new_log();

    let weak = center.downgrade();
    let late_log = log.clone();
    let added = Arc::new(Mutex::new(false));
    let flag = added.clone();
    center.subscribe(move |e: &Damaged| {
        late_log.lock().push(format!("early:{}", e.amount));
        let mut added = flag.lock();
        if !*added {
            *added = true;
            if let Some(center) = weak.upgrade() {
                let log = late_log.clone();
                center.subscribe(move |e: &Damaged| log.lock().push(format!("late:{}", e.amount)));
            }
        }
    });

    center.publish(Damaged { amount: 1 });
    center.publish(Damaged { amount: 2 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["early:1", "early:2", "late:2"]);
}

#[test]
fn test_unsubscribing_self_during_dispatch() {
    let center = EventCenter::default();
    let log = new_log();
    let own: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

    let weak = center.downgrade();
    let slot = own.clone();
    let sink = log.clone();
    let handle = center.subscribe(move |e: &Damaged| {
        sink.lock().push(format!("self:{}", e.amount));
        if let (Some(center), Some(handle)) = (weak.upgrade(), slot.lock().as_ref()) {
            center.unsubscribe(handle);
        }
    });
    *own.lock() = Some(handle);
    center.subscribe(record(&log, "other"));

    center.publish(Damaged { amount: 1 });
    center.publish(Damaged { amount: 2 });
    center.process_events();

    assert_eq!(*log.lock(), vec!["self:1", "other:1", "other:2"]);
}

#[test]
fn test_subscribe_once() {
    let center = EventCenter::default();
    let log = new_log();

    let handle = center.subscribe_once(record(&log, "once"), 0);
    center.subscribe(record(&log, "always"));

    for amount in 0..3 {
        center.publish(Damaged { amount });
    }
    center.process_events();

    assert_eq!(*log.lock(), vec!["once:0", "always:0", "always:1", "always:2"]);
    assert!(!handle.is_active());
    assert!(!center.unsubscribe(&handle));
}

#[test]
fn test_unknown_handle_unsubscribe_is_not_fatal() {
    let center = EventCenter::default();
    let handle = center.subscribe(|_: &Damaged| {});
    assert!(center.unsubscribe(&handle));
    assert!(!center.unsubscribe(&handle));
    assert!(!center.unsubscribe_id(handle.id()));
}
