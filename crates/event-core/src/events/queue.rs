//! FIFO batching queues
//!
//! The queue lock is held only to push or pop a single container, never
//! while the batch handler runs. A handler may therefore publish into the
//! same queue it is being drained from; those events land at the tail.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::events::container::EventContainer;

/// A FIFO queue of containers awaiting dispatch.
///
/// The capacity is a preallocation hint, not a limit: enqueue never fails
/// and never drops. Growth past the capacity is logged once per crossing.
pub struct EventQueue {
    name: &'static str,
    items: Mutex<VecDeque<EventContainer>>,
    capacity: usize,
    peak: AtomicUsize,
}

impl EventQueue {
    /// Create a queue with room for `capacity` containers
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            peak: AtomicUsize::new(0),
        }
    }

    /// Append a container; returns the new length
    pub fn enqueue(&self, container: EventContainer) -> usize {
        let len = {
            let mut items = self.items.lock();
            items.push_back(container);
            items.len()
        };
        if len == self.capacity + 1 {
            debug!(queue = self.name, capacity = self.capacity, "queue grew past its capacity");
        }
        self.peak.fetch_max(len, Ordering::Relaxed);
        len
    }

    /// Pop the oldest container
    pub fn dequeue(&self) -> Option<EventContainer> {
        self.items.lock().pop_front()
    }

    /// Dequeue up to `max_count` containers in FIFO order and hand each one
    /// to `handler`. Returns how many were processed; an empty queue
    /// returns 0 without calling the handler.
    pub fn process_batch<F>(&self, mut handler: F, max_count: usize) -> usize
    where
        F: FnMut(EventContainer),
    {
        let mut processed = 0;
        while processed < max_count {
            let Some(container) = self.dequeue() else {
                break;
            };
            handler(container);
            processed += 1;
        }
        processed
    }

    /// Remove and return everything queued
    pub fn drain_all(&self) -> Vec<EventContainer> {
        self.items.lock().drain(..).collect()
    }

    /// Queued containers
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest length observed
    pub fn peak_len(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Queue name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }
}
