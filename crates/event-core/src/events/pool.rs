//! Per-payload-type container pool
//!
//! Each payload type gets its own free list. Containers come out of
//! [`EventPool::acquire`] initialized with a payload and go back through
//! [`EventPool::release`], which drops the payload and parks the container
//! for the next publish of the same type.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config::EventCenterConfig;
use crate::events::container::EventContainer;
use crate::events::{Event, EventTypeId, Priority};

/// What [`EventPool::release`] did with a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Reset and parked on its type's free list
    Pooled,
    /// Not poolable; disposed and dropped
    NotPoolable,
    /// Already disposed; a double release, ignored
    AlreadyDisposed,
    /// The type's free list is at capacity; disposed and dropped
    PoolFull,
}

#[derive(Default)]
struct PoolState {
    free: HashMap<EventTypeId, Vec<EventContainer>>,
    hits: u64,
    misses: u64,
}

/// Free lists of reusable containers, keyed by payload type
pub struct EventPool {
    state: Mutex<PoolState>,
    initial_size: usize,
    max_size: usize,
    enabled: bool,
}

impl EventPool {
    /// Create a pool that prewarms `initial_size` containers per type and
    /// keeps at most `max_size` free containers per type
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            initial_size: initial_size.min(max_size),
            max_size,
            enabled: true,
        }
    }

    /// Create a pool sized from the Event Center configuration
    pub fn from_config(config: &EventCenterConfig) -> Self {
        let mut pool = Self::new(config.initial_pool_size, config.max_pool_size);
        pool.enabled = config.enable_pooling;
        pool
    }

    /// Whether containers handed out by this pool are poolable
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Make sure the free list for `E` exists, creating the initial
    /// containers on first sight. Returns the free count for `E`.
    pub fn prewarm<E: Event>(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let mut state = self.state.lock();
        self.free_list::<E>(&mut state).len()
    }

    /// Hand out a container holding `payload`, reusing a free one if possible
    pub fn acquire<E: Event>(&self, payload: E, priority: Priority) -> EventContainer {
        if !self.enabled {
            let mut container = EventContainer::new(payload, priority);
            container.set_poolable(false);
            return container;
        }

        let reused = {
            let mut state = self.state.lock();
            let reused = self.free_list::<E>(&mut state).pop();
            if reused.is_some() {
                state.hits += 1;
            } else {
                state.misses += 1;
            }
            reused
        };

        if let Some(mut container) = reused {
            match container.try_fill(payload, priority) {
                Ok(()) => return container,
                Err(payload) => {
                    // Free lists are keyed by type; a mismatch means a foreign
                    // container was parked on the wrong list.
                    warn!(event_type = %EventTypeId::of::<E>(), "discarding mistyped pooled container");
                    return EventContainer::new(payload, priority);
                }
            }
        }
        EventContainer::new(payload, priority)
    }

    /// Return a container after dispatch.
    ///
    /// The disposed flag guards against double release: a container that is
    /// already disposed is ignored instead of being parked twice.
    pub fn release(&self, mut container: EventContainer) -> ReleaseOutcome {
        if container.is_disposed() {
            warn!(
                event_type = %container.event_type(),
                "container released twice; ignoring"
            );
            return ReleaseOutcome::AlreadyDisposed;
        }

        container.dispose();
        if !container.is_poolable() {
            return ReleaseOutcome::NotPoolable;
        }

        let mut state = self.state.lock();
        let list = state.free.entry(container.event_type()).or_default();
        if list.len() >= self.max_size {
            trace!(event_type = %container.event_type(), "pool full; dropping container");
            return ReleaseOutcome::PoolFull;
        }
        list.push(container);
        ReleaseOutcome::Pooled
    }

    /// Free containers available for `E`
    pub fn available<E: Event>(&self) -> usize {
        self.available_for(EventTypeId::of::<E>())
    }

    /// Free containers available for a payload type
    pub fn available_for(&self, event_type: EventTypeId) -> usize {
        self.state
            .lock()
            .free
            .get(&event_type)
            .map_or(0, |list| list.len())
    }

    /// Free containers across all payload types
    pub fn total_available(&self) -> usize {
        self.state.lock().free.values().map(Vec::len).sum()
    }

    /// Acquisitions served from a free list
    pub fn hits(&self) -> u64 {
        self.state.lock().hits
    }

    /// Acquisitions that had to create a container
    pub fn misses(&self) -> u64 {
        self.state.lock().misses
    }

    /// Drop every free container and reset the counters
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.free.clear();
        state.hits = 0;
        state.misses = 0;
    }

    fn free_list<'a, E: Event>(&self, state: &'a mut PoolState) -> &'a mut Vec<EventContainer> {
        let initial = self.initial_size;
        let max = self.max_size;
        state.free.entry(EventTypeId::of::<E>()).or_insert_with(|| {
            let mut list = Vec::with_capacity(max.min(initial.max(1) * 2));
            list.extend((0..initial).map(|_| EventContainer::vacant::<E>()));
            list
        })
    }
}
