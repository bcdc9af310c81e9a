//! Type-erased event container
//!
//! A container owns one payload behind a typed slot. The slot is allocated
//! once, when the container is first created for a payload type; reusing the
//! container from the pool only moves a new payload into the existing slot,
//! so steady-state publishing does not touch the allocator.

use std::any::Any;
use std::fmt;

use crate::error::{Error, Result};
use crate::events::{Event, EventTypeId, Priority, NORMAL_PRIORITY};

/// Storage for a single payload of a fixed type
trait PayloadSlot: Send + Sync {
    fn value(&self) -> Option<&dyn Any>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn is_empty(&self) -> bool;
    fn clear(&mut self);
}

struct TypedSlot<E>(Option<E>);

impl<E: Event> PayloadSlot for TypedSlot<E> {
    fn value(&self) -> Option<&dyn Any> {
        self.0.as_ref().map(|payload| payload as &dyn Any)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    fn clear(&mut self) {
        self.0 = None;
    }
}

/// A payload plus its dispatch metadata.
///
/// Invariant: a disposed container holds no payload and is never dispatched;
/// it is either sitting in a pool's free list or about to be dropped.
pub struct EventContainer {
    event_type: EventTypeId,
    slot: Box<dyn PayloadSlot>,
    priority: Priority,
    immediate: bool,
    poolable: bool,
    disposed: bool,
    uses: u64,
}

impl EventContainer {
    /// Wrap `payload` in a fresh, poolable container
    pub fn new<E: Event>(payload: E, priority: Priority) -> Self {
        Self {
            event_type: EventTypeId::of::<E>(),
            slot: Box::new(TypedSlot(Some(payload))),
            priority,
            immediate: false,
            poolable: true,
            disposed: false,
            uses: 1,
        }
    }

    /// An empty, disposed container ready to sit in a free list
    pub(crate) fn vacant<E: Event>() -> Self {
        Self {
            event_type: EventTypeId::of::<E>(),
            slot: Box::new(TypedSlot::<E>(None)),
            priority: NORMAL_PRIORITY,
            immediate: false,
            poolable: true,
            disposed: true,
            uses: 0,
        }
    }

    /// Move a new payload into this container and clear the disposed flag.
    ///
    /// Fails if the container was created for another payload type.
    pub fn initialize<E: Event>(&mut self, payload: E, priority: Priority) -> Result<()> {
        self.try_fill(payload, priority)
            .map_err(|_| Error::PayloadTypeMismatch {
                expected: self.event_type.name(),
                actual: std::any::type_name::<E>(),
            })
    }

    /// Like [`initialize`](Self::initialize) but hands the payload back on a
    /// type mismatch.
    pub(crate) fn try_fill<E: Event>(
        &mut self,
        payload: E,
        priority: Priority,
    ) -> std::result::Result<(), E> {
        let Some(slot) = self.slot.as_any_mut().downcast_mut::<TypedSlot<E>>() else {
            return Err(payload);
        };
        slot.0 = Some(payload);
        self.priority = priority;
        self.immediate = false;
        self.disposed = false;
        self.uses += 1;
        Ok(())
    }

    /// Drop the payload and mark the container disposed
    pub fn dispose(&mut self) {
        self.slot.clear();
        self.immediate = false;
        self.disposed = true;
    }

    /// Borrow the payload as `E`
    pub fn payload<E: Event>(&self) -> Option<&E> {
        self.slot.value()?.downcast_ref::<E>()
    }

    /// Borrow the payload without naming its type
    pub fn payload_any(&self) -> Option<&dyn Any> {
        self.slot.value()
    }

    /// Move the payload out, leaving the container disposed
    pub fn take_payload<E: Event>(&mut self) -> Result<E> {
        if self.disposed {
            return Err(Error::ContainerDisposed {
                event_type: self.event_type.name(),
            });
        }
        let slot = self
            .slot
            .as_any_mut()
            .downcast_mut::<TypedSlot<E>>()
            .ok_or(Error::PayloadTypeMismatch {
                expected: self.event_type.name(),
                actual: std::any::type_name::<E>(),
            })?;
        let payload = slot.0.take().ok_or(Error::ContainerDisposed {
            event_type: self.event_type.name(),
        })?;
        self.dispose();
        Ok(payload)
    }

    /// Payload type this container was created for
    pub fn event_type(&self) -> EventTypeId {
        self.event_type
    }

    /// Publish priority
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether the container was routed to the immediate queue
    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub(crate) fn set_immediate(&mut self, immediate: bool) {
        self.immediate = immediate;
    }

    /// Whether the container goes back to its pool after dispatch
    pub fn is_poolable(&self) -> bool {
        self.poolable
    }

    /// Opt the container in or out of pooling
    pub fn set_poolable(&mut self, poolable: bool) {
        self.poolable = poolable;
    }

    /// Whether the container has been disposed since its last initialization
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether the slot currently holds no payload
    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }

    /// Number of payloads this container has carried
    pub fn use_count(&self) -> u64 {
        self.uses
    }

    /// Address of the payload slot; stable across reuse
    #[cfg(test)]
    pub(crate) fn slot_addr(&self) -> usize {
        &*self.slot as *const dyn PayloadSlot as *const () as usize
    }
}

impl fmt::Debug for EventContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContainer")
            .field("event_type", &self.event_type.name())
            .field("priority", &self.priority)
            .field("immediate", &self.immediate)
            .field("poolable", &self.poolable)
            .field("disposed", &self.disposed)
            .field("uses", &self.uses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Damaged {
        amount: i32,
    }

    #[derive(Debug, PartialEq)]
    struct Healed {
        amount: i32,
    }

    #[test]
    fn test_new_container() {
        let container = EventContainer::new(Damaged { amount: 3 }, 5);
        assert_eq!(container.event_type(), EventTypeId::of::<Damaged>());
        assert_eq!(container.priority(), 5);
        assert!(container.is_poolable());
        assert!(!container.is_disposed());
        assert!(!container.is_immediate());
        assert_eq!(container.payload::<Damaged>(), Some(&Damaged { amount: 3 }));
        assert_eq!(container.payload::<Healed>(), None);
    }

    #[test]
    fn test_dispose_clears_payload() {
        let mut container = EventContainer::new(Damaged { amount: 3 }, 0);
        container.dispose();
        assert!(container.is_disposed());
        assert!(container.is_empty());
        assert!(container.payload::<Damaged>().is_none());
        assert!(container.payload_any().is_none());
    }

    #[test]
    fn test_initialize_reuses_slot() {
        let mut container = EventContainer::new(Damaged { amount: 3 }, 0);
        let addr = container.slot_addr();
        container.dispose();

        container.initialize(Damaged { amount: 7 }, 2).unwrap();
        assert_eq!(container.slot_addr(), addr);
        assert!(!container.is_disposed());
        assert_eq!(container.priority(), 2);
        assert_eq!(container.use_count(), 2);
        assert_eq!(container.payload::<Damaged>(), Some(&Damaged { amount: 7 }));
    }

    #[test]
    fn test_initialize_rejects_other_type() {
        let mut container = EventContainer::vacant::<Damaged>();
        let err = container.initialize(Healed { amount: 1 }, 0).unwrap_err();
        assert!(matches!(err, Error::PayloadTypeMismatch { .. }));
        assert!(container.is_disposed());
    }

    #[test]
    fn test_take_payload() {
        let mut container = EventContainer::new(Damaged { amount: 9 }, 0);
        assert_eq!(container.take_payload::<Damaged>().unwrap(), Damaged { amount: 9 });
        assert!(container.is_disposed());
        assert!(matches!(
            container.take_payload::<Damaged>(),
            Err(Error::ContainerDisposed { .. })
        ));
    }
}
