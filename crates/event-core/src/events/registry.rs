//! Subscription registry
//!
//! Subscriptions live in one bucket per payload type, sorted by descending
//! priority and, among equal priorities, by subscription order. A bucket's
//! entry list is shared copy-on-write with in-flight dispatches: a dispatch
//! takes a snapshot (an `Arc` clone, no allocation), and a subscribe that
//! happens meanwhile copies the list instead of mutating the snapshot.
//!
//! Unsubscribing flips the entry's active flag at once. The entry is removed
//! from its bucket immediately when no dispatch for that type is running,
//! otherwise when the last running dispatch for the type finishes.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::events::handler::{ErasedHandler, EventListener, FnHandler, ListenerHandler, ListenerId};
use crate::events::{Event, EventTypeId, Priority};

/// Identifier of one (listener, event type) binding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw value, for logging
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One registered subscription
pub(crate) struct SubscriptionEntry {
    id: SubscriptionId,
    event_type: EventTypeId,
    listener: ListenerId,
    priority: Priority,
    once: bool,
    active: AtomicBool,
    handler: Box<dyn ErasedHandler>,
}

impl SubscriptionEntry {
    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn event_type(&self) -> EventTypeId {
        self.event_type
    }

    pub(crate) fn listener(&self) -> ListenerId {
        self.listener
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn is_once(&self) -> bool {
        self.once
    }

    /// Deactivate; returns whether this call did it
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn handler(&self) -> &dyn ErasedHandler {
        &*self.handler
    }
}

/// Snapshot of a bucket handed to a dispatch pass
pub(crate) type ListenerSnapshot = Arc<Vec<Arc<SubscriptionEntry>>>;

#[derive(Default)]
struct Bucket {
    entries: ListenerSnapshot,
    dispatch_depth: usize,
    needs_compaction: bool,
}

impl Bucket {
    fn compact(&mut self, index: &mut HashMap<SubscriptionId, EventTypeId>) {
        if self.entries.iter().all(|entry| entry.is_active()) {
            return;
        }
        let entries = Arc::make_mut(&mut self.entries);
        entries.retain(|entry| {
            if entry.is_active() {
                true
            } else {
                index.remove(&entry.id);
                false
            }
        });
    }
}

#[derive(Default)]
struct RegistryState {
    buckets: HashMap<EventTypeId, Bucket>,
    index: HashMap<SubscriptionId, EventTypeId>,
    next_id: u64,
}

/// Type-indexed registry of active subscriptions
#[derive(Default)]
pub struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for events of type `E`
    pub fn subscribe<E, F>(&self, listener: ListenerId, priority: Priority, callback: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(
            EventTypeId::of::<E>(),
            listener,
            priority,
            false,
            Box::new(FnHandler::new(callback)),
        )
    }

    /// Register a listener object for events of type `E`
    pub fn subscribe_listener<E, L>(&self, listener: &Arc<L>, priority: Priority) -> SubscriptionId
    where
        E: Event,
        L: EventListener<E>,
    {
        self.insert(
            EventTypeId::of::<E>(),
            ListenerId::of(listener),
            priority,
            false,
            Box::new(ListenerHandler::new(listener.clone())),
        )
    }

    pub(crate) fn insert(
        &self,
        event_type: EventTypeId,
        listener: ListenerId,
        priority: Priority,
        once: bool,
        handler: Box<dyn ErasedHandler>,
    ) -> SubscriptionId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);

        let entry = Arc::new(SubscriptionEntry {
            id,
            event_type,
            listener,
            priority,
            once,
            active: AtomicBool::new(true),
            handler,
        });

        let bucket = state.buckets.entry(event_type).or_default();
        // Stable on ties: land after every entry with priority >= ours.
        let position = bucket.entries.partition_point(|e| e.priority >= priority);
        Arc::make_mut(&mut bucket.entries).insert(position, entry);
        state.index.insert(id, event_type);

        debug!(
            subscription_id = %id,
            event_type = %event_type,
            listener = %listener,
            priority,
            "subscribed"
        );
        id
    }

    /// Remove a subscription.
    ///
    /// Returns `false`, with a warning, if the id is not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if self.remove(id) {
            true
        } else {
            warn!(subscription_id = %id, "unsubscribe for unknown subscription");
            false
        }
    }

    /// Remove a subscription that may already be gone, without warning
    pub(crate) fn retire(&self, id: SubscriptionId) {
        self.remove(id);
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(event_type) = state.index.remove(&id) else {
            return false;
        };
        let Some(bucket) = state.buckets.get_mut(&event_type) else {
            return true;
        };

        if let Some(entry) = bucket.entries.iter().find(|entry| entry.id == id) {
            entry.deactivate();
        }

        if bucket.dispatch_depth > 0 {
            bucket.needs_compaction = true;
        } else {
            Arc::make_mut(&mut bucket.entries).retain(|entry| entry.id != id);
            if bucket.entries.is_empty() {
                state.buckets.remove(&event_type);
            }
        }
        debug!(subscription_id = %id, event_type = %event_type, "unsubscribed");
        true
    }

    /// Remove every subscription held by `listener`; returns how many
    pub fn unsubscribe_all(&self, listener: ListenerId) -> usize {
        let ids: Vec<SubscriptionId> = {
            let state = self.state.lock();
            state
                .buckets
                .values()
                .flat_map(|bucket| bucket.entries.iter())
                .filter(|entry| entry.listener == listener && entry.is_active())
                .map(|entry| entry.id)
                .collect()
        };
        let removed = ids.into_iter().filter(|id| self.remove(*id)).count();
        if removed == 0 {
            warn!(listener = %listener, "unsubscribe_all found no subscriptions");
        }
        removed
    }

    /// Whether subscription `id` is registered and active
    pub fn is_active(&self, id: SubscriptionId) -> bool {
        let state = self.state.lock();
        let Some(event_type) = state.index.get(&id) else {
            return false;
        };
        state
            .buckets
            .get(event_type)
            .and_then(|bucket| bucket.entries.iter().find(|entry| entry.id == id))
            .is_some_and(|entry| entry.is_active())
    }

    /// Whether any active subscription exists for `E`
    pub fn is_registered<E: Event>(&self) -> bool {
        self.listener_count_for(EventTypeId::of::<E>()) > 0
    }

    /// Active subscriptions for `E`
    pub fn listener_count<E: Event>(&self) -> usize {
        self.listener_count_for(EventTypeId::of::<E>())
    }

    /// Active subscriptions for a payload type
    pub fn listener_count_for(&self, event_type: EventTypeId) -> usize {
        self.state
            .lock()
            .buckets
            .get(&event_type)
            .map_or(0, |bucket| bucket.entries.iter().filter(|e| e.is_active()).count())
    }

    /// Active subscriptions across all payload types
    pub fn active_subscriptions(&self) -> usize {
        self.state
            .lock()
            .buckets
            .values()
            .flat_map(|bucket| bucket.entries.iter())
            .filter(|entry| entry.is_active())
            .count()
    }

    /// Payload types with at least one stored subscription
    pub fn registered_types(&self) -> Vec<EventTypeId> {
        self.state.lock().buckets.keys().copied().collect()
    }

    /// Deactivate and drop every subscription.
    ///
    /// Buckets with a dispatch in flight are kept, empty, so the running
    /// pass can finish its bookkeeping.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        for bucket in state.buckets.values() {
            for entry in bucket.entries.iter() {
                entry.deactivate();
            }
        }
        state.buckets.retain(|_, bucket| bucket.dispatch_depth > 0);
        for bucket in state.buckets.values_mut() {
            bucket.entries = Arc::default();
            bucket.needs_compaction = false;
        }
        state.index.clear();
    }

    /// Start a dispatch pass for `event_type` and snapshot its listeners
    pub(crate) fn begin_dispatch(&self, event_type: EventTypeId) -> Option<ListenerSnapshot> {
        let mut state = self.state.lock();
        let bucket = state.buckets.get_mut(&event_type)?;
        bucket.dispatch_depth += 1;
        Some(bucket.entries.clone())
    }

    /// Finish a dispatch pass; compacts the bucket once no pass is running
    pub(crate) fn end_dispatch(&self, event_type: EventTypeId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(bucket) = state.buckets.get_mut(&event_type) else {
            return;
        };
        bucket.dispatch_depth = bucket.dispatch_depth.saturating_sub(1);
        if bucket.dispatch_depth == 0 && bucket.needs_compaction {
            bucket.compact(&mut state.index);
            bucket.needs_compaction = false;
        }
        if bucket.dispatch_depth == 0 && bucket.entries.is_empty() {
            state.buckets.remove(&event_type);
        }
    }

    /// Entries stored for a type, active or not
    #[cfg(test)]
    pub(crate) fn stored_len(&self, event_type: EventTypeId) -> usize {
        self.state
            .lock()
            .buckets
            .get(&event_type)
            .map_or(0, |bucket| bucket.entries.len())
    }
}
