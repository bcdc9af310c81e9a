//! Subscription handles

use std::fmt;
use std::sync::Weak;

use crate::events::center::Inner;
use crate::events::handler::ListenerId;
use crate::events::registry::SubscriptionId;
use crate::events::EventTypeId;

/// Returned by every `subscribe*` call.
///
/// Dropping a handle does not unsubscribe; use [`dispose`](Self::dispose) or
/// convert it into a [`SubscriptionGuard`]. A handle that outlives its
/// Event Center is inert.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    event_type: EventTypeId,
    listener: ListenerId,
    center: Weak<Inner>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        event_type: EventTypeId,
        listener: ListenerId,
        center: Weak<Inner>,
    ) -> Self {
        Self {
            id,
            event_type,
            listener,
            center,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_type(&self) -> EventTypeId {
        self.event_type
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    /// Whether the subscription is still registered
    pub fn is_active(&self) -> bool {
        self.center
            .upgrade()
            .map(|center| center.is_active(self.id))
            .unwrap_or(false)
    }

    /// Unsubscribe; returns `false` if the subscription or the center is gone
    pub fn dispose(self) -> bool {
        match self.center.upgrade() {
            Some(center) => center.unsubscribe(self.id),
            None => false,
        }
    }

    /// Tie the subscription to a scope
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { handle: Some(self) }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("listener", &self.listener)
            .finish()
    }
}

/// Unsubscribes when dropped
#[derive(Debug)]
#[must_use = "the subscription ends as soon as the guard is dropped"]
pub struct SubscriptionGuard {
    handle: Option<SubscriptionHandle>,
}

impl SubscriptionGuard {
    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        self.handle.as_ref()
    }

    /// Keep the subscription alive past the guard
    pub fn release(mut self) -> Option<SubscriptionHandle> {
        self.handle.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Some(center) = handle.center.upgrade() {
                // Quiet removal: the subscription may already be gone after
                // a clear or an explicit unsubscribe.
                if center.is_active(handle.id) {
                    center.unsubscribe(handle.id);
                }
            }
        }
    }
}
