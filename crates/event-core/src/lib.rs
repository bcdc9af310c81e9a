//! # Tickbus Event Core: typed in-process event bus
//!
//! Moves thousands of events per tick between decoupled producers and
//! consumers. Producers publish plain Rust values; consumers subscribe by
//! payload type with a priority. The host drives delivery by calling
//! [`EventCenter::process_events`] once per tick.
//!
//! ## Features
//!
//! - **Pooled containers**: payload wrappers are reused per payload type
//! - **Priority fan-out**: listeners run highest priority first, ties in
//!   subscription order
//! - **Two-tier queuing**: immediate queue drained before the normal queue,
//!   plus fully synchronous [`EventCenter::publish_immediate`]
//! - **Per-tick budget**: the normal queue is drained up to
//!   `max_events_per_tick`; the rest waits for the next tick
//! - **Failure isolation**: a panicking or failing listener is logged and
//!   the remaining listeners still run
//!
//! ## Usage
//!
//! ```rust
//! use tickbus_event_core::{EventCenter, EventCenterConfig};
//!
//! #[derive(Debug)]
//! struct Damaged {
//!     amount: i32,
//! }
//!
//! let center = EventCenter::new(EventCenterConfig::default())?;
//! let _ui = center.subscribe_with_priority(|e: &Damaged| println!("ui {}", e.amount), 10);
//! let _audio = center.subscribe(|e: &Damaged| println!("audio {}", e.amount));
//!
//! center.publish(Damaged { amount: 5 });
//! let report = center.process_events();
//! assert_eq!(report.processed(), 1);
//! # Ok::<(), tickbus_event_core::Error>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod system;

// Re-export commonly used types and traits
pub use config::EventCenterConfig;
pub use error::{Error, Result};
pub use events::{
    CenterState, Event, EventCenter, EventContainer, EventListener, EventPool, EventTypeId,
    ListenerFailure, ListenerId, Priority, ReleaseOutcome, Stats, SubscriptionGuard,
    SubscriptionHandle, SubscriptionId, TickReport, WeakEventCenter, NORMAL_PRIORITY,
};
pub use logging::{setup_logging, LoggingConfig};
pub use system::EventSystem;

/// Version information for the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for hosts
pub mod prelude {
    pub use crate::config::EventCenterConfig;
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        Event, EventCenter, EventListener, ListenerId, Priority, Stats, SubscriptionGuard,
        SubscriptionHandle, TickReport, NORMAL_PRIORITY,
    };
    pub use crate::system::EventSystem;
}
