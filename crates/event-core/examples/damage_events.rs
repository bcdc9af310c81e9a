//! Walkthrough of a small damage pipeline: two closure listeners at
//! different priorities, a listener object, and a budget-limited tick.

use std::sync::Arc;

use parking_lot::Mutex;
use tickbus_event_core::logging::{parse_log_level, setup_logging, LoggingConfig};
use tickbus_event_core::{EventCenter, EventCenterConfig, EventListener};

#[derive(Debug, Clone)]
struct Damaged {
    target: &'static str,
    amount: i32,
}

#[derive(Debug, Clone)]
struct Died {
    target: &'static str,
}

struct HealthTracker {
    health: Mutex<i32>,
}

impl EventListener<Damaged> for HealthTracker {
    fn handle_event(&self, event: &Damaged) -> anyhow::Result<()> {
        let mut health = self.health.lock();
        *health -= event.amount;
        println!("  [tracker] {} health now {}", event.target, *health);
        Ok(())
    }

    fn listener_name(&self) -> &str {
        "health-tracker"
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging(LoggingConfig::new(parse_log_level("debug")?, "damage_events"))?;

    println!("Damage Events Example");
    println!("=====================");

    let config = EventCenterConfig::default()
        .with_max_events_per_tick(2)
        .with_logging(true);
    let center = EventCenter::new(config)?;

    let weak = center.downgrade();
    let _ui = center.subscribe_with_priority(
        move |e: &Damaged| {
            println!("  [ui] {} took {} damage", e.target, e.amount);
            if e.amount >= 50 {
                if let Some(center) = weak.upgrade() {
                    // Deaths go to the immediate queue and run first next tick.
                    center.publish_with_priority(Died { target: e.target }, 1);
                }
            }
        },
        10,
    );
    let _audio = center.subscribe_with_priority(
        |e: &Damaged| println!("  [audio] hit sound for {}", e.amount),
        5,
    );

    let tracker = Arc::new(HealthTracker {
        health: Mutex::new(100),
    });
    let _tracker = center.subscribe_listener::<Damaged, _>(&tracker, 0);
    let _death = center
        .subscribe_once(|e: &Died| println!("  [game] {} died", e.target), 0)
        .into_guard();

    center.publish(Damaged { target: "orc", amount: 3 });
    center.publish(Damaged { target: "orc", amount: 7 });
    center.publish(Damaged { target: "orc", amount: 90 });

    let mut tick = 0;
    while center.pending_events() > 0 {
        tick += 1;
        println!("tick {}:", tick);
        let report = center.process_events();
        println!(
            "  processed {} (immediate {}, normal {}), {} left",
            report.processed(),
            report.immediate,
            report.normal,
            report.remaining
        );
    }

    println!("stats: {}", center.stats().to_json()?);
    Ok(())
}
