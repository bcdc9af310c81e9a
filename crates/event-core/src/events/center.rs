//! Event Center: the orchestrator
//!
//! Owns the pool, registry, dispatcher and both queues, and exposes the
//! publish/subscribe/process surface to the host. The host calls
//! [`EventCenter::process_events`] once per tick:
//!
//! ```text
//! publish ──► pool.acquire ──► immediate queue (priority > 0)
//!                          └─► normal queue    (otherwise)
//!
//! process_events:
//!   immediate queue ── drained up to max_immediate_drain_per_tick
//!   normal queue    ── drained up to max_events_per_tick - processed
//!   each container  ── dispatcher.dispatch ──► pool.release
//! ```
//!
//! No lock is held while a listener runs, so listeners may freely publish,
//! subscribe, unsubscribe or clear from inside a callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::EventCenterConfig;
use crate::error::Result;
use crate::events::container::EventContainer;
use crate::events::dispatcher::{Dispatcher, ListenerFailure};
use crate::events::handle::SubscriptionHandle;
use crate::events::handler::{EventListener, FnHandler, ListenerId};
use crate::events::pool::{EventPool, ReleaseOutcome};
use crate::events::queue::EventQueue;
use crate::events::registry::{SubscriptionId, SubscriptionRegistry};
use crate::events::stats::{Stats, TickHistory};
use crate::events::{Event, EventTypeId, Priority, NORMAL_PRIORITY};
use crate::logging::LogContext;

/// Lifecycle of an Event Center
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterState {
    /// No instance exists yet (only reported by the global facade)
    Uninitialized,
    /// Ready; not inside `process_events`
    Initialized,
    /// Inside `process_events`
    Processing,
    /// `clear` ran and nothing has been published or subscribed since
    Cleared,
}

/// Outcome of one `process_events` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1; 0 for a skipped call or for a tick
    /// during which a listener cleared the center
    pub tick: u64,
    /// Events dispatched from the immediate queue
    pub immediate: usize,
    /// Events dispatched from the normal queue
    pub normal: usize,
    /// Events still queued when the tick ended
    pub remaining: usize,
    /// Wall time spent in the tick
    pub elapsed: Duration,
    /// The call was nested inside another `process_events` and did nothing
    pub skipped_reentrant: bool,
}

impl TickReport {
    /// Events dispatched in this tick
    pub fn processed(&self) -> usize {
        self.immediate + self.normal
    }

    fn skipped() -> Self {
        Self {
            skipped_reentrant: true,
            ..Default::default()
        }
    }
}

pub(crate) struct Inner {
    config: EventCenterConfig,
    pool: EventPool,
    registry: SubscriptionRegistry,
    dispatcher: Dispatcher,
    immediate: EventQueue,
    normal: EventQueue,
    processing: AtomicBool,
    cleared: AtomicBool,
    /// Bumped by every `clear`
    epoch: AtomicU64,
    /// `publish_immediate` nesting per calling thread
    immediate_depth: Mutex<HashMap<ThreadId, usize>>,
    published: AtomicU64,
    processed: AtomicU64,
    history: Mutex<TickHistory>,
}

impl Inner {
    fn log_events(&self) -> bool {
        self.config.enable_logging
    }

    fn mark_live(&self) {
        self.cleared.store(false, Ordering::Release);
    }

    fn enqueue<E: Event>(&self, payload: E, priority: Priority) {
        self.mark_live();
        let mut container = self.pool.acquire(payload, priority);
        self.published.fetch_add(1, Ordering::Relaxed);

        let queue = if priority > NORMAL_PRIORITY {
            container.set_immediate(true);
            &self.immediate
        } else {
            &self.normal
        };
        let len = queue.enqueue(container);
        if self.log_events() {
            trace!(
                event_type = %EventTypeId::of::<E>(),
                priority,
                queue = queue.name(),
                queued = len,
                "published"
            );
        }
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Dispatch one container and give it back to the pool.
    ///
    /// If a listener cleared the center during the dispatch, the container
    /// is dropped and the event is not counted.
    fn dispatch_and_release(&self, mut container: EventContainer) -> usize {
        let epoch = self.epoch();
        let notified = self.dispatcher.dispatch(&self.registry, &container);
        if self.epoch() != epoch {
            container.dispose();
            debug!(event_type = %container.event_type(), "center cleared during dispatch; container dropped");
            return notified;
        }
        self.processed.fetch_add(1, Ordering::Relaxed);
        if self.pool.release(container) == ReleaseOutcome::AlreadyDisposed {
            debug!("dispatched container was already disposed");
        }
        notified
    }

    /// Enter one `publish_immediate` level on the calling thread; returns
    /// the depth before entering
    fn enter_immediate(&self, thread: ThreadId) -> usize {
        let mut depths = self.immediate_depth.lock();
        let depth = depths.entry(thread).or_insert(0);
        *depth += 1;
        *depth - 1
    }

    fn leave_immediate(&self, thread: ThreadId) {
        let mut depths = self.immediate_depth.lock();
        if let Some(depth) = depths.get_mut(&thread) {
            *depth -= 1;
            if *depth == 0 {
                depths.remove(&thread);
            }
        }
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    pub(crate) fn is_active(&self, id: SubscriptionId) -> bool {
        self.registry.is_active(id)
    }
}

/// Leaves the calling thread's `publish_immediate` level on scope exit
struct DepthGuard<'a> {
    inner: &'a Inner,
    thread: ThreadId,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.inner.leave_immediate(self.thread);
    }
}

/// Clears the processing flag on scope exit
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The event bus.
///
/// Cloning is cheap and yields another handle to the same bus. Listeners
/// that need to call back into the bus should capture a [`WeakEventCenter`]
/// (see [`EventCenter::downgrade`]) rather than a clone, otherwise the
/// registry keeps the bus alive through its own listeners until `clear`.
#[derive(Clone)]
pub struct EventCenter {
    inner: Arc<Inner>,
}

/// Non-owning handle to an [`EventCenter`]
#[derive(Clone)]
pub struct WeakEventCenter {
    inner: Weak<Inner>,
}

impl WeakEventCenter {
    /// Get the Event Center back if it is still alive
    pub fn upgrade(&self) -> Option<EventCenter> {
        self.inner.upgrade().map(|inner| EventCenter { inner })
    }
}

impl Default for EventCenter {
    fn default() -> Self {
        Self::build(EventCenterConfig::default())
    }
}

impl EventCenter {
    /// Create an Event Center; fails if the configuration is invalid
    pub fn new(config: EventCenterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EventCenterConfig) -> Self {
        debug!(?config, "creating event center");
        let inner = Inner {
            pool: EventPool::from_config(&config),
            registry: SubscriptionRegistry::new(),
            dispatcher: Dispatcher::new(config.enable_logging),
            immediate: EventQueue::new("immediate", config.immediate_queue_capacity),
            normal: EventQueue::new("normal", config.normal_queue_capacity),
            processing: AtomicBool::new(false),
            cleared: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            immediate_depth: Mutex::new(HashMap::new()),
            published: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            history: Mutex::new(TickHistory::new(config.stats_window)),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Non-owning handle for use inside listeners
    pub fn downgrade(&self) -> WeakEventCenter {
        WeakEventCenter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Configuration this instance was built with
    pub fn config(&self) -> &EventCenterConfig {
        &self.inner.config
    }

    /// The container pool
    pub fn pool(&self) -> &EventPool {
        &self.inner.pool
    }

    /// The subscription registry
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    // ---- publishing -------------------------------------------------------

    /// Queue `payload` on the normal queue
    pub fn publish<E: Event>(&self, payload: E) {
        self.inner.enqueue(payload, NORMAL_PRIORITY);
    }

    /// Queue `payload`; a priority above zero routes it to the immediate
    /// queue, which is drained first on the next tick
    pub fn publish_with_priority<E: Event>(&self, payload: E, priority: Priority) {
        self.inner.enqueue(payload, priority);
    }

    /// Dispatch `payload` synchronously, before this call returns.
    ///
    /// Returns the number of listeners invoked. Nested calls from inside
    /// listeners are allowed up to `max_publish_immediate_depth` per thread;
    /// past that the event is queued on the immediate queue instead of
    /// recursing.
    pub fn publish_immediate<E: Event>(&self, payload: E) -> usize {
        self.publish_immediate_with_priority(payload, NORMAL_PRIORITY)
    }

    /// [`publish_immediate`](Self::publish_immediate) with an explicit priority
    pub fn publish_immediate_with_priority<E: Event>(&self, payload: E, priority: Priority) -> usize {
        let inner = &*self.inner;
        inner.mark_live();

        let thread = thread::current().id();
        let depth = inner.enter_immediate(thread);
        let _depth = DepthGuard { inner, thread };
        let mut container = inner.pool.acquire(payload, priority);
        container.set_immediate(true);
        inner.published.fetch_add(1, Ordering::Relaxed);

        if depth >= inner.config.max_publish_immediate_depth {
            warn!(
                event_type = %EventTypeId::of::<E>(),
                depth,
                limit = inner.config.max_publish_immediate_depth,
                "publish_immediate nesting limit reached; queueing instead"
            );
            inner.immediate.enqueue(container);
            return 0;
        }

        let notified = inner.dispatch_and_release(container);
        if inner.log_events() {
            trace!(
                event_type = %EventTypeId::of::<E>(),
                depth,
                listeners = notified,
                "published immediately"
            );
        }
        notified
    }

    // ---- subscribing ------------------------------------------------------

    /// Subscribe a closure to events of type `E` at normal priority
    pub fn subscribe<E, F>(&self, callback: F) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_with_priority(callback, NORMAL_PRIORITY)
    }

    /// Subscribe a closure; higher priorities are invoked first
    pub fn subscribe_with_priority<E, F>(&self, callback: F, priority: Priority) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_as(ListenerId::new(), callback, priority)
    }

    /// Subscribe a closure under an explicit listener identity, so several
    /// closures can be removed together with [`unsubscribe_all`](Self::unsubscribe_all)
    pub fn subscribe_as<E, F>(&self, listener: ListenerId, callback: F, priority: Priority) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.prepare::<E>();
        let id = self.inner.registry.subscribe::<E, F>(listener, priority, callback);
        self.handle_for::<E>(id, listener)
    }

    /// Subscribe a closure that runs for the next event of type `E` only
    pub fn subscribe_once<E, F>(&self, callback: F, priority: Priority) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.prepare::<E>();
        let listener = ListenerId::new();
        let id = self.inner.registry.insert(
            EventTypeId::of::<E>(),
            listener,
            priority,
            true,
            Box::new(FnHandler::new(callback)),
        );
        self.handle_for::<E>(id, listener)
    }

    /// Subscribe a listener object; its identity is the `Arc` it lives in
    pub fn subscribe_listener<E, L>(&self, listener: &Arc<L>, priority: Priority) -> SubscriptionHandle
    where
        E: Event,
        L: EventListener<E>,
    {
        self.prepare::<E>();
        let id = self.inner.registry.subscribe_listener::<E, L>(listener, priority);
        self.handle_for::<E>(id, ListenerId::of(listener))
    }

    fn prepare<E: Event>(&self) {
        self.inner.mark_live();
        self.inner.pool.prewarm::<E>();
    }

    fn handle_for<E: Event>(&self, id: SubscriptionId, listener: ListenerId) -> SubscriptionHandle {
        SubscriptionHandle::new(id, EventTypeId::of::<E>(), listener, Arc::downgrade(&self.inner))
    }

    /// Cancel one subscription; returns `false` if it was not registered
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.inner.unsubscribe(handle.id())
    }

    /// Cancel a subscription by id
    pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Cancel every subscription held by `listener`; returns how many
    pub fn unsubscribe_all(&self, listener: ListenerId) -> usize {
        self.inner.registry.unsubscribe_all(listener)
    }

    /// Cancel every subscription of a listener object
    pub fn unsubscribe_listener<L: ?Sized>(&self, listener: &Arc<L>) -> usize {
        self.unsubscribe_all(ListenerId::of(listener))
    }

    // ---- processing -------------------------------------------------------

    /// Run one tick: drain the immediate queue, then the normal queue up to
    /// the remaining per-tick budget.
    ///
    /// A nested call (from a listener, or another thread while a tick is
    /// running) does nothing and reports `skipped_reentrant`.
    pub fn process_events(&self) -> TickReport {
        let inner = &*self.inner;
        if inner
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("process_events called while a tick is already running; ignoring");
            return TickReport::skipped();
        }
        let _processing = ProcessingGuard(&inner.processing);

        let tick = inner.history.lock().ticks() + 1;
        let context = LogContext::new("event_center", "process_events").with_field("tick", tick);
        let span = context.span();
        let _entered = span.enter();

        let epoch = inner.epoch();
        let started = Instant::now();
        let batch = inner.config.max_batch_size;
        let dispatch = |container: EventContainer| {
            inner.dispatch_and_release(container);
        };

        let cap = inner.config.max_immediate_drain_per_tick;
        let mut immediate = 0;
        while immediate < cap {
            let n = inner.immediate.process_batch(dispatch, batch.min(cap - immediate));
            if n == 0 {
                break;
            }
            immediate += n;
        }
        if immediate >= cap && !inner.immediate.is_empty() {
            warn!(
                cap,
                pending = inner.immediate.len(),
                "immediate drain cap reached; remaining immediate events deferred"
            );
        }

        let mut normal = 0;
        let mut budget = inner.config.max_events_per_tick.saturating_sub(immediate);
        while budget > 0 {
            let n = inner.normal.process_batch(dispatch, batch.min(budget));
            if n == 0 {
                break;
            }
            normal += n;
            budget -= n;
        }

        let remaining = inner.immediate.len() + inner.normal.len();
        if budget == 0 && remaining > 0 && inner.log_events() {
            debug!(remaining, "tick budget exhausted; events carried to next tick");
        }

        let elapsed = started.elapsed();
        let tick = if inner.epoch() == epoch {
            inner.history.lock().record(immediate + normal, elapsed)
        } else {
            // A listener cleared the center; the reset history stays reset.
            inner.history.lock().ticks()
        };
        if inner.log_events() {
            debug!(immediate, normal, remaining, ?elapsed, "tick complete");
        }

        TickReport {
            tick,
            immediate,
            normal,
            remaining,
            elapsed,
            skipped_reentrant: false,
        }
    }

    /// Drop all queued events, subscriptions and pooled containers, and
    /// reset statistics. Safe to call repeatedly and from inside listeners.
    pub fn clear(&self) {
        let inner = &*self.inner;
        inner.epoch.fetch_add(1, Ordering::AcqRel);
        let mut discarded = 0;
        for mut container in inner
            .immediate
            .drain_all()
            .into_iter()
            .chain(inner.normal.drain_all())
        {
            container.dispose();
            discarded += 1;
        }
        let subscriptions = inner.registry.active_subscriptions();
        inner.registry.clear();
        inner.pool.clear();
        inner.dispatcher.reset();
        inner.history.lock().reset();
        inner.published.store(0, Ordering::Relaxed);
        inner.processed.store(0, Ordering::Relaxed);
        inner.cleared.store(true, Ordering::Release);

        info!(discarded, subscriptions, "event center cleared");
    }

    // ---- queries ----------------------------------------------------------

    /// Statistics snapshot; never mutates state
    pub fn stats(&self) -> Stats {
        let inner = &*self.inner;
        let (last, peak, average, ticks) = {
            let history = inner.history.lock();
            (
                history.last_processed(),
                history.peak(),
                history.average_ms(),
                history.ticks(),
            )
        };
        let immediate_queued = inner.immediate.len();
        let normal_queued = inner.normal.len();

        Stats {
            events_processed_this_tick: last,
            queued_events: immediate_queued + normal_queued,
            immediate_queued,
            normal_queued,
            active_subscriptions: inner.registry.active_subscriptions(),
            pooled_events: inner.pool.total_available(),
            average_processing_time_ms: average,
            peak_events_per_tick: peak,
            tick_count: ticks,
            total_published: inner.published.load(Ordering::Relaxed),
            total_processed: inner.processed.load(Ordering::Relaxed),
            listener_failures: inner.dispatcher.failure_count(),
            pool_hits: inner.pool.hits(),
            pool_misses: inner.pool.misses(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CenterState {
        if self.inner.processing.load(Ordering::Acquire) {
            CenterState::Processing
        } else if self.inner.cleared.load(Ordering::Acquire) {
            CenterState::Cleared
        } else {
            CenterState::Initialized
        }
    }

    /// Events waiting in both queues
    pub fn pending_events(&self) -> usize {
        self.inner.immediate.len() + self.inner.normal.len()
    }

    /// Completed ticks
    pub fn tick_count(&self) -> u64 {
        self.inner.history.lock().ticks()
    }

    /// Whether any active subscription exists for `E`
    pub fn is_registered<E: Event>(&self) -> bool {
        self.inner.registry.is_registered::<E>()
    }

    /// Active subscriptions for `E`
    pub fn listener_count<E: Event>(&self) -> usize {
        self.inner.registry.listener_count::<E>()
    }

    /// The most recent listener failure
    pub fn last_listener_failure(&self) -> Option<ListenerFailure> {
        self.inner.dispatcher.last_failure()
    }
}
