//! Typed in-process event bus
//!
//! The building blocks, leaf first:
//!
//! - [`EventContainer`]: type-erased, reusable wrapper around one payload
//! - [`EventPool`]: per-payload-type free lists of containers
//! - [`SubscriptionRegistry`]: priority-ordered listener buckets per type
//! - [`Dispatcher`]: fans one container out to its listeners, isolating failures
//! - [`EventQueue`]: FIFO batching queue (one immediate, one normal)
//! - [`EventCenter`]: the orchestrator hosts talk to
//!
//! Payloads are plain Rust values; any `Send + Sync + 'static` type is an
//! [`Event`]. Routing is keyed by [`EventTypeId`], a `TypeId` paired with the
//! type name for logging.

pub mod center;
pub mod container;
pub mod dispatcher;
pub mod handle;
pub mod handler;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod stats;

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use center::{CenterState, EventCenter, TickReport, WeakEventCenter};
pub use container::EventContainer;
pub use dispatcher::{Dispatcher, ListenerFailure};
pub use handle::{SubscriptionGuard, SubscriptionHandle};
pub use handler::{EventListener, ListenerId};
pub use pool::{EventPool, ReleaseOutcome};
pub use queue::EventQueue;
pub use registry::{SubscriptionId, SubscriptionRegistry};
pub use stats::Stats;

/// Marker trait for event payloads.
///
/// Blanket-implemented for every `Send + Sync + 'static` type, so payloads
/// need no registration or derive.
pub trait Event: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Event for T {}

/// Priority value used for both publishing and subscribing.
///
/// Publishing with a priority above [`NORMAL_PRIORITY`] routes the event to
/// the immediate queue. Listeners with higher priority are invoked first.
pub type Priority = i32;

/// Default priority for publishes and subscriptions
pub const NORMAL_PRIORITY: Priority = 0;

/// Stable identifier of a payload type
#[derive(Clone, Copy)]
pub struct EventTypeId {
    id: TypeId,
    name: &'static str,
}

impl EventTypeId {
    /// Identifier of payload type `E`
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// The underlying `TypeId`
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, for logging only
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for EventTypeId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventTypeId {}

impl Hash for EventTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventTypeId({})", self.name)
    }
}

impl fmt::Display for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
