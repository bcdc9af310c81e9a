//! Process-wide event bus
//!
//! [`EventSystem`] owns one [`EventCenter`] behind a global slot for hosts
//! that want a single bus without threading a handle through every
//! subsystem. The core types never touch it.
//!
//! ```rust
//! use tickbus_event_core::{EventCenterConfig, EventSystem};
//!
//! struct Saved;
//!
//! EventSystem::init(EventCenterConfig::default())?;
//! let handle = EventSystem::subscribe(|_: &Saved| println!("saved"))?;
//! EventSystem::publish(Saved)?;
//! EventSystem::process_events()?;
//! EventSystem::unsubscribe(&handle)?;
//! EventSystem::shutdown();
//! # Ok::<(), tickbus_event_core::Error>(())
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::config::EventCenterConfig;
use crate::error::{Error, Result};
use crate::events::{
    CenterState, Event, EventCenter, ListenerId, Priority, Stats, SubscriptionHandle, TickReport,
};

static GLOBAL: Lazy<RwLock<Option<EventCenter>>> = Lazy::new(|| RwLock::new(None));

/// Static façade over a single global [`EventCenter`].
///
/// Every call clones the center out of the global slot before running, so
/// listeners may call back into `EventSystem` (including `shutdown`).
pub struct EventSystem;

impl EventSystem {
    /// Create the global Event Center
    pub fn init(config: EventCenterConfig) -> Result<()> {
        let mut slot = GLOBAL.write();
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        *slot = Some(EventCenter::new(config)?);
        info!("event system initialized");
        Ok(())
    }

    /// Clear and drop the global Event Center. Returns whether one existed.
    pub fn shutdown() -> bool {
        let center = GLOBAL.write().take();
        match center {
            Some(center) => {
                center.clear();
                info!("event system shut down");
                true
            }
            None => false,
        }
    }

    pub fn is_initialized() -> bool {
        GLOBAL.read().is_some()
    }

    /// A handle to the global Event Center
    pub fn center() -> Result<EventCenter> {
        GLOBAL.read().clone().ok_or(Error::NotInitialized)
    }

    /// `Uninitialized` when no global instance exists
    pub fn state() -> CenterState {
        GLOBAL
            .read()
            .as_ref()
            .map(EventCenter::state)
            .unwrap_or(CenterState::Uninitialized)
    }

    pub fn publish<E: Event>(payload: E) -> Result<()> {
        Self::center()?.publish(payload);
        Ok(())
    }

    pub fn publish_with_priority<E: Event>(payload: E, priority: Priority) -> Result<()> {
        Self::center()?.publish_with_priority(payload, priority);
        Ok(())
    }

    pub fn publish_immediate<E: Event>(payload: E) -> Result<usize> {
        Ok(Self::center()?.publish_immediate(payload))
    }

    pub fn subscribe<E, F>(callback: F) -> Result<SubscriptionHandle>
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        Ok(Self::center()?.subscribe(callback))
    }

    pub fn subscribe_with_priority<E, F>(callback: F, priority: Priority) -> Result<SubscriptionHandle>
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        Ok(Self::center()?.subscribe_with_priority(callback, priority))
    }

    pub fn unsubscribe(handle: &SubscriptionHandle) -> Result<bool> {
        Ok(Self::center()?.unsubscribe(handle))
    }

    pub fn unsubscribe_all(listener: ListenerId) -> Result<usize> {
        Ok(Self::center()?.unsubscribe_all(listener))
    }

    pub fn process_events() -> Result<TickReport> {
        Ok(Self::center()?.process_events())
    }

    pub fn clear() -> Result<()> {
        Self::center()?.clear();
        Ok(())
    }

    pub fn stats() -> Result<Stats> {
        Ok(Self::center()?.stats())
    }
}
