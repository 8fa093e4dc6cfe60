//! # Events delivered to listeners.
//!
//! An [`Event`] is created fresh for one dispatch call and shared (`Arc<Event>`)
//! with every listener of that call. It carries:
//! - an opaque **source** reference (downcast with [`Event::source`]);
//! - the target [`Category`];
//! - the mutable `handled` / `prevented` flags;
//! - an optional **cause** (the event being dispatched when this one was built);
//! - an opaque [`Properties`] bag;
//! - the set-once back-reference to the registry that dispatched it;
//! - its cascade state: categories it suppresses and the events it suppressed.
//!
//! ## Ordering
//! Each event gets a monotonically increasing `seq`, useful to correlate log
//! lines and to restore creation order after concurrent delivery.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Category, Event};
//!
//! let ev = Event::new("checkout-service", "ping").with_property("attempt", 2u32);
//!
//! assert_eq!(ev.category(), &Category::new("ping"));
//! assert_eq!(ev.source::<&str>(), Some(&"checkout-service"));
//! assert_eq!(ev.properties().get::<u32>("attempt").as_deref(), Some(&2));
//! assert!(!ev.is_handled());
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::SystemTime;

use crate::events::{Category, EventStack, Properties};
use crate::listeners::RegistryId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Cascade bookkeeping read by the [`EventStack`] while this event's frame is active.
#[derive(Default)]
struct CascadeState {
    suppressed: HashSet<Category>,
    prevented_events: Vec<Arc<Event>>,
}

/// Single-use notification payload.
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock creation timestamp.
    pub at: SystemTime,

    source: Arc<dyn Any + Send + Sync>,
    category: Category,
    handled: AtomicBool,
    prevented: AtomicBool,
    cause: Option<Arc<Event>>,
    properties: Properties,
    registry: OnceLock<RegistryId>,
    cascade: Mutex<CascadeState>,
}

impl Event {
    /// Creates a new event from `source` targeting `category`.
    pub fn new<S: Any + Send + Sync>(source: S, category: impl Into<Category>) -> Self {
        Self::with_shared_source(Arc::new(source), category)
    }

    /// Creates a new event whose source is an already shared value.
    pub fn with_shared_source(
        source: Arc<dyn Any + Send + Sync>,
        category: impl Into<Category>,
    ) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            source,
            category: category.into(),
            handled: AtomicBool::new(false),
            prevented: AtomicBool::new(false),
            cause: None,
            properties: Properties::new(),
            registry: OnceLock::new(),
            cascade: Mutex::new(CascadeState::default()),
        }
    }

    /// Attaches an explicit cause.
    #[inline]
    pub fn with_cause(mut self, cause: Arc<Event>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Records the event of the innermost active frame of `stack` (if any) as the cause.
    ///
    /// Lets code running inside a listener chain events without holding a
    /// reference to the dispatcher, only to its stack.
    #[inline]
    pub fn caused_by_top_of(mut self, stack: &EventStack) -> Self {
        self.cause = stack.peek().map(|frame| Arc::clone(frame.event()));
        self
    }

    /// Attaches a property (builder form of [`Properties::set`]).
    #[inline]
    pub fn with_property<T: Any + Send + Sync>(self, key: &str, value: T) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Suppresses cascading dispatches of `category` while this event is being dispatched (builder form).
    #[inline]
    pub fn preventing(self, category: impl Into<Category>) -> Self {
        self.prevent_cascade(category);
        self
    }

    /// Wraps the event for dispatch.
    #[inline]
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the source if it is of type `T`.
    pub fn source<T: Any>(&self) -> Option<&T> {
        self.source.downcast_ref::<T>()
    }

    /// Returns the shared source reference.
    pub fn shared_source(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.source
    }

    /// Target category.
    #[inline]
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// True once a listener marked the event handled.
    #[inline]
    pub fn is_handled(&self) -> bool {
        self.handled.load(AtomicOrdering::Acquire)
    }

    /// Marks the event handled; sequential dispatchers notify no further listeners.
    #[inline]
    pub fn set_handled(&self) {
        self.handled.store(true, AtomicOrdering::Release);
    }

    /// True if the dispatch of this event was suppressed as a cascade.
    #[inline]
    pub fn is_prevented(&self) -> bool {
        self.prevented.load(AtomicOrdering::Acquire)
    }

    /// The event that was being dispatched when this one was created, if recorded.
    #[inline]
    pub fn cause(&self) -> Option<&Arc<Event>> {
        self.cause.as_ref()
    }

    /// Outermost event of the cause chain (the event itself if it has no cause).
    pub fn root_cause(&self) -> &Event {
        let mut current = self;
        while let Some(parent) = current.cause.as_deref() {
            current = parent;
        }
        current
    }

    /// Property bag.
    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Registry that dispatched this event (set once, when delivery starts).
    #[inline]
    pub fn registry(&self) -> Option<RegistryId> {
        self.registry.get().copied()
    }

    /// Suppresses cascading dispatches of `category` while this event's frame is active.
    pub fn prevent_cascade(&self, category: impl Into<Category>) {
        self.cascade_state().suppressed.insert(category.into());
    }

    /// Lifts a suppression added by [`Event::prevent_cascade`].
    pub fn allow_cascade(&self, category: &Category) -> bool {
        self.cascade_state().suppressed.remove(category)
    }

    /// True if this event suppresses cascading dispatches of `category`.
    pub fn suppresses(&self, category: &Category) -> bool {
        self.cascade_state().suppressed.contains(category)
    }

    /// Events whose dispatch was suppressed because of this event, in suppression order.
    pub fn prevented_events(&self) -> Vec<Arc<Event>> {
        self.cascade_state().prevented_events.clone()
    }

    fn cascade_state(&self) -> std::sync::MutexGuard<'_, CascadeState> {
        self.cascade.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_prevented(&self) {
        self.prevented.store(true, AtomicOrdering::Release);
    }

    /// Sets the registry back-reference; false if the event was already dispatched once.
    pub(crate) fn bind_registry(&self, id: RegistryId) -> bool {
        self.registry.set(id).is_ok()
    }

    pub(crate) fn record_prevented(&self, event: Arc<Event>) {
        self.cascade_state().prevented_events.push(event);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("seq", &self.seq)
            .field("category", &self.category)
            .field("handled", &self.is_handled())
            .field("prevented", &self.is_prevented())
            .field("cause", &self.cause.as_ref().map(|c| c.seq))
            .field("registry", &self.registry())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new((), "a");
        let b = Event::new((), "a");
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_registry_back_reference_is_set_once() {
        let ev = Event::new((), "a");
        let first = RegistryId::next();
        assert!(ev.bind_registry(first));
        assert!(!ev.bind_registry(RegistryId::next()));
        assert_eq!(ev.registry(), Some(first));
    }

    #[test]
    fn test_cascade_suppression_toggle() {
        let ev = Event::new((), "a").preventing("b");
        assert!(ev.suppresses(&Category::new("b")));
        assert!(ev.allow_cascade(&Category::new("b")));
        assert!(!ev.suppresses(&Category::new("b")));
    }

    #[test]
    fn test_root_cause_walks_chain() {
        let root = Event::new((), "a").into_arc();
        let mid = Event::new((), "b").with_cause(Arc::clone(&root)).into_arc();
        let leaf = Event::new((), "c").with_cause(Arc::clone(&mid));
        assert_eq!(leaf.root_cause().seq, root.seq);
        assert_eq!(root.root_cause().seq, root.seq);
    }

    #[test]
    fn test_source_downcast() {
        let ev = Event::new(42u64, "a");
        assert_eq!(ev.source::<u64>(), Some(&42));
        assert!(ev.source::<i32>().is_none());
    }
}
