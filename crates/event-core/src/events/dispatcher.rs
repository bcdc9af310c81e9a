//! Event dispatcher
//!
//! Fans one container out to every active listener of its payload type, in
//! registry order. Each invocation runs behind its own failure boundary: a
//! listener that panics or returns an error is logged and counted, and the
//! pass continues with the next listener.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{error, trace, warn};

use crate::events::container::EventContainer;
use crate::events::handler::ListenerId;
use crate::events::registry::{SubscriptionEntry, SubscriptionId, SubscriptionRegistry};
use crate::events::EventTypeId;

/// A listener that failed while handling an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Payload type being dispatched
    pub event_type: EventTypeId,
    /// Subscription whose callback failed
    pub subscription: SubscriptionId,
    /// Listener owning the subscription
    pub listener: ListenerId,
    /// Callback name
    pub callback: String,
    /// Error or panic message
    pub message: String,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener {} ({}) failed on {}: {}",
            self.subscription, self.callback, self.event_type, self.message
        )
    }
}

/// Delivers containers to their listeners
pub struct Dispatcher {
    log_events: bool,
    failures: AtomicU64,
    last_failure: Mutex<Option<ListenerFailure>>,
}

impl Dispatcher {
    /// Create a dispatcher; `log_events` enables per-dispatch trace logs
    pub fn new(log_events: bool) -> Self {
        Self {
            log_events,
            failures: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// Invoke every active listener for the container's payload type.
    ///
    /// Returns the number of listeners invoked. A listener that fails still
    /// counts; listeners deactivated since the snapshot was taken are
    /// skipped and not counted.
    pub fn dispatch(&self, registry: &SubscriptionRegistry, container: &EventContainer) -> usize {
        let event_type = container.event_type();
        let payload = match container.payload_any() {
            Some(payload) if !container.is_disposed() => payload,
            _ => {
                warn!(event_type = %event_type, "refusing to dispatch a disposed container");
                return 0;
            }
        };

        let Some(snapshot) = registry.begin_dispatch(event_type) else {
            if self.log_events {
                trace!(event_type = %event_type, "no listeners");
            }
            return 0;
        };

        let mut notified = 0;
        for entry in snapshot.iter() {
            if !entry.is_active() {
                continue;
            }
            // One-shot subscriptions retire before running, so a nested
            // dispatch of the same type cannot fire them again.
            if entry.is_once() {
                if !entry.deactivate() {
                    continue;
                }
                registry.retire(entry.id());
            }

            notified += 1;
            self.invoke(entry, payload);
        }
        registry.end_dispatch(event_type);

        if self.log_events {
            trace!(
                event_type = %event_type,
                priority = container.priority(),
                listeners = notified,
                "dispatched"
            );
        }
        notified
    }

    fn invoke(&self, entry: &SubscriptionEntry, payload: &dyn Any) {
        let handler = entry.handler();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.invoke(payload)));
        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(message)) => message,
            Err(panic) => panic_message(panic.as_ref()),
        };

        let failure = ListenerFailure {
            event_type: entry.event_type(),
            subscription: entry.id(),
            listener: entry.listener(),
            callback: handler.describe().to_string(),
            message,
        };
        error!(
            event_type = %failure.event_type,
            subscription_id = %failure.subscription,
            listener = %failure.listener,
            callback = %failure.callback,
            priority = entry.priority(),
            "listener failed: {}",
            failure.message
        );
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(failure);
    }

    /// Listener failures recorded so far
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// The most recent listener failure
    pub fn last_failure(&self) -> Option<ListenerFailure> {
        self.last_failure.lock().clone()
    }

    /// Forget recorded failures
    pub fn reset(&self) {
        self.failures.store(0, Ordering::Relaxed);
        *self.last_failure.lock() = None;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
