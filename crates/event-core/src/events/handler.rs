//! Listener callbacks and their type-erased invokers
//!
//! Every subscription stores a boxed [`ErasedHandler`] built at subscribe
//! time. The handler knows its payload type, so dispatch only has to hand it
//! the container's `&dyn Any` payload; the downcast happens inside.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::events::Event;

/// An object that reacts to events of type `E`.
///
/// Returning `Err` is reported as a listener failure: it is logged, counted,
/// and does not stop delivery to the other listeners.
pub trait EventListener<E: Event>: Send + Sync + 'static {
    /// Handle one event
    fn handle_event(&self, event: &E) -> anyhow::Result<()>;

    /// Name used in failure logs
    fn listener_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

const OBJECT_TAG: u64 = 1 << 63;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a listener, used by `unsubscribe_all`.
///
/// Closure subscriptions get a fresh id unless one is supplied; listener
/// objects are identified by the address of their `Arc`, which the registry
/// keeps alive while any of their subscriptions exist.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a new, unique listener id
    pub fn new() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Identity of a shared listener object
    pub fn of<L: ?Sized>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize as u64 | OBJECT_TAG)
    }

    /// Raw value, for logging
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 & OBJECT_TAG != 0 {
            write!(f, "ListenerId(obj:{:#x})", self.0 & !OBJECT_TAG)
        } else {
            write!(f, "ListenerId({})", self.0)
        }
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type-erased invoker stored in the registry
pub(crate) trait ErasedHandler: Send + Sync {
    /// Run the callback. `Err` carries the failure message.
    fn invoke(&self, payload: &dyn Any) -> Result<(), String>;

    /// Human readable name of the callback
    fn describe(&self) -> &str;
}

/// Invoker for plain closures
pub(crate) struct FnHandler<E, F> {
    callback: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnHandler<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    pub(crate) fn new(callback: F) -> Self {
        Self {
            callback,
            _event: PhantomData,
        }
    }
}

impl<E, F> ErasedHandler for FnHandler<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    fn invoke(&self, payload: &dyn Any) -> Result<(), String> {
        let event = downcast::<E>(payload)?;
        (self.callback)(event);
        Ok(())
    }

    fn describe(&self) -> &str {
        std::any::type_name::<F>()
    }
}

/// Invoker for [`EventListener`] objects
pub(crate) struct ListenerHandler<E, L> {
    listener: Arc<L>,
    _event: PhantomData<fn(&E)>,
}

impl<E, L> ListenerHandler<E, L>
where
    E: Event,
    L: EventListener<E>,
{
    pub(crate) fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            _event: PhantomData,
        }
    }
}

impl<E, L> ErasedHandler for ListenerHandler<E, L>
where
    E: Event,
    L: EventListener<E>,
{
    fn invoke(&self, payload: &dyn Any) -> Result<(), String> {
        let event = downcast::<E>(payload)?;
        self.listener
            .handle_event(event)
            .map_err(|e| format!("{:#}", e))
    }

    fn describe(&self) -> &str {
        self.listener.listener_name()
    }
}

fn downcast<E: Event>(payload: &dyn Any) -> Result<&E, String> {
    payload.downcast_ref::<E>().ok_or_else(|| {
        format!(
            "payload is not a {}; listener registered under the wrong type",
            std::any::type_name::<E>()
        )
    })
}
