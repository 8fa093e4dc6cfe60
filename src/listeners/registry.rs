//! # Listener registry: storage, ordering, snapshots.
//!
//! [`ListenerSource`] is the read side used by dispatchers (snapshots), and
//! [`ListenerRegistry`] adds the write side used by application code.
//! [`SequentialRegistry`] is the base implementation; ordering decorators in
//! [`priority`](super::PriorityRegistry) and [`chain`](super::ChainOfResponsibility)
//! compose it.
//!
//! ## Architecture
//! ```text
//! register(cat, L) ──► write lock ──► slots[cat].entries.push / insert by priority
//!                          │                 └─► (optimized) rebuild slots[cat].shared
//!                          └─► unlock ──► L.on_attach(cat)   (failure → router, never returned)
//!
//! snapshot(cat) ──► read lock ──► optimized? Arc clone of shared : copy of entries
//!                                └─► absent category → empty snapshot
//! ```
//!
//! ## Rules
//! - Insertion order is preserved (append) unless the registry orders by priority.
//! - A snapshot is a value: later register/unregister calls never show up in it.
//! - Hooks run after the lock is released, on the caller's thread.
//! - Removing the last listener of a category prunes the category.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::error::{DispatchError, ListenerError};
use crate::events::Category;
use crate::listeners::{Listener, ListenerEntry};
use crate::routing::{ExceptionContext, FailurePhase, RouterRef, default_router, guarded, route_failure};

/// Immutable point-in-time copy of a category's listeners.
pub type Snapshot<L> = Arc<[Arc<L>]>;

/// Process-unique registry identifier (the event back-reference).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(u64);

impl RegistryId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Read side of a registry.
pub trait ListenerSource<L: ?Sized>: Send + Sync {
    /// Point-in-time copy of the listeners of `category` (empty if absent).
    fn snapshot(&self, category: &Category) -> Snapshot<L>;

    /// True only if snapshot order always equals registration order.
    fn is_sequential(&self) -> bool;

    /// Number of listeners currently registered for `category`.
    fn listener_count(&self, category: &Category) -> usize {
        self.snapshot(category).len()
    }
}

/// Write side of a registry.
pub trait ListenerRegistry<L: ?Sized>: ListenerSource<L> {
    /// Identifier stored in the events this registry dispatches.
    fn id(&self) -> RegistryId;

    /// Adds `listener` to `category`.
    ///
    /// ### Errors
    /// [`DispatchError::InvalidArgument`] if `category` is empty.
    fn register(&self, category: &Category, listener: Arc<L>) -> Result<(), DispatchError>;

    /// Adds `listener` with a priority; registries without priority ordering append.
    fn register_with_priority(
        &self,
        category: &Category,
        listener: Arc<L>,
        _priority: i32,
    ) -> Result<(), DispatchError> {
        self.register(category, listener)
    }

    /// Removes one entry of `listener` from `category`; false if absent.
    fn unregister(&self, category: &Category, listener: &Arc<L>) -> bool;

    /// Removes every listener of `category`; returns how many were removed.
    fn unregister_category(&self, category: &Category) -> usize;

    /// Removes every listener of every category; returns how many were removed.
    fn unregister_all(&self) -> usize;

    /// Sorted list of categories with at least one listener.
    fn categories(&self) -> Vec<Category>;

    /// Detaches everything.
    fn close(&self) {
        self.unregister_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertOrder {
    Append,
    Priority,
}

struct Slot<L: ?Sized> {
    entries: Vec<ListenerEntry<L>>,
    /// Copy-on-write view, maintained only after `optimize()`.
    shared: Option<Snapshot<L>>,
}

impl<L: ?Sized> Slot<L> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            shared: None,
        }
    }

    fn copy(&self) -> Snapshot<L> {
        self.entries.iter().map(|e| Arc::clone(e.listener())).collect()
    }

    fn refresh(&mut self, optimized: bool) {
        if optimized {
            self.shared = Some(self.copy());
        }
    }
}

/// Base registry: category → ordered listener list behind a reader/writer lock.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use eventvisor::{Category, Listener, ListenerRegistry, ListenerSource, SequentialRegistry};
///
/// struct Audit;
/// impl Listener for Audit {}
///
/// let reg: SequentialRegistry<Audit> = SequentialRegistry::new();
/// let orders = Category::new("orders");
/// let a = Arc::new(Audit);
///
/// reg.register(&orders, a.clone()).unwrap();
/// assert_eq!(reg.snapshot(&orders).len(), 1);
/// assert!(reg.unregister(&orders, &a));
/// assert!(!reg.unregister(&orders, &a));
/// assert!(reg.snapshot(&orders).is_empty());
/// ```
pub struct SequentialRegistry<L: ?Sized> {
    id: RegistryId,
    order: InsertOrder,
    slots: RwLock<HashMap<Category, Slot<L>>>,
    optimized: AtomicBool,
    next_seq: AtomicU64,
    router: RwLock<RouterRef<L>>,
}

impl<L: Listener + ?Sized> SequentialRegistry<L> {
    /// Creates an empty registry with the logging router.
    #[must_use]
    pub fn new() -> Self {
        Self::with_order(InsertOrder::Append)
    }

    pub(crate) fn with_order(order: InsertOrder) -> Self {
        Self {
            id: RegistryId::next(),
            order,
            slots: RwLock::new(HashMap::new()),
            optimized: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            router: RwLock::new(default_router()),
        }
    }

    /// Replaces the router used for attach/detach failures (`None` restores the logging router).
    pub fn set_exception_router(&self, router: Option<RouterRef<L>>) {
        *self.router.write().unwrap_or_else(PoisonError::into_inner) =
            router.unwrap_or_else(default_router);
    }

    /// Builder form of [`set_exception_router`](Self::set_exception_router).
    #[must_use]
    pub fn with_exception_router(self, router: RouterRef<L>) -> Self {
        self.set_exception_router(Some(router));
        self
    }

    /// Switches to copy-on-write storage: O(n) writes, O(1) snapshots. Irreversible.
    ///
    /// Returns false if the registry was already optimized.
    pub fn optimize(&self) -> bool {
        let mut slots = self.write_slots();
        if self.optimized.swap(true, AtomicOrdering::AcqRel) {
            return false;
        }
        for slot in slots.values_mut() {
            slot.refresh(true);
        }
        debug!(registry = self.id.get(), categories = slots.len(), "registry optimized");
        true
    }

    /// True after [`optimize`](Self::optimize).
    pub fn is_optimized(&self) -> bool {
        self.optimized.load(AtomicOrdering::Acquire)
    }

    /// Entries of `category` with their ordering keys, in snapshot order.
    pub fn entries(&self, category: &Category) -> Vec<ListenerEntry<L>> {
        self.read_slots()
            .get(category)
            .map(|slot| slot.entries.clone())
            .unwrap_or_default()
    }

    pub(crate) fn insert(
        &self,
        category: &Category,
        listener: Arc<L>,
        priority: i32,
    ) -> Result<(), DispatchError> {
        if category.is_empty() {
            return Err(DispatchError::InvalidArgument { what: "category" });
        }
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        let entry = ListenerEntry::new(Arc::clone(&listener), priority, seq);
        {
            let mut slots = self.write_slots();
            let optimized = self.is_optimized();
            let slot = slots.entry(category.clone()).or_insert_with(Slot::new);
            match self.order {
                InsertOrder::Append => slot.entries.push(entry),
                InsertOrder::Priority => {
                    let pos = slot.entries.partition_point(|e| e.priority() <= priority);
                    slot.entries.insert(pos, entry);
                }
            }
            slot.refresh(optimized);
        }
        trace!(
            registry = self.id.get(),
            category = %category,
            listener = listener.name(),
            priority,
            "listener registered"
        );
        self.run_hook(category, &listener, FailurePhase::Attach);
        Ok(())
    }

    fn read_slots(&self) -> RwLockReadGuard<'_, HashMap<Category, Slot<L>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, HashMap<Category, Slot<L>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn router(&self) -> RouterRef<L> {
        Arc::clone(&self.router.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Runs an attach/detach hook; failures go to the router and stop there.
    fn run_hook(&self, category: &Category, listener: &Arc<L>, phase: FailurePhase) {
        let res = guarded(|| match phase {
            FailurePhase::Detach => listener.on_detach(category),
            _ => listener.on_attach(category),
        });
        let Err(err) = res else { return };

        let ctx = ExceptionContext::hook(&err, listener, category, phase);
        if let Err(signal) = route_failure(self.router().as_ref(), &ctx) {
            debug!(
                listener = listener.name(),
                phase = phase.as_label(),
                reason = %signal,
                "abort signal ignored outside dispatch"
            );
        }
    }

    fn detach_all(&self, category: &Category, entries: Vec<ListenerEntry<L>>) -> usize {
        let count = entries.len();
        for entry in entries {
            self.run_hook(category, entry.listener(), FailurePhase::Detach);
        }
        count
    }
}

impl<L: Listener + ?Sized> Default for SequentialRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Listener + ?Sized> ListenerSource<L> for SequentialRegistry<L> {
    fn snapshot(&self, category: &Category) -> Snapshot<L> {
        let slots = self.read_slots();
        match slots.get(category) {
            Some(Slot {
                shared: Some(shared),
                ..
            }) => Arc::clone(shared),
            Some(slot) => slot.copy(),
            None => Arc::from(Vec::new()),
        }
    }

    fn is_sequential(&self) -> bool {
        self.order == InsertOrder::Append
    }

    fn listener_count(&self, category: &Category) -> usize {
        self.read_slots()
            .get(category)
            .map_or(0, |slot| slot.entries.len())
    }
}

impl<L: Listener + ?Sized> ListenerRegistry<L> for SequentialRegistry<L> {
    fn id(&self) -> RegistryId {
        self.id
    }

    fn register(&self, category: &Category, listener: Arc<L>) -> Result<(), DispatchError> {
        self.insert(category, listener, 0)
    }

    fn register_with_priority(
        &self,
        category: &Category,
        listener: Arc<L>,
        priority: i32,
    ) -> Result<(), DispatchError> {
        self.insert(category, listener, priority)
    }

    fn unregister(&self, category: &Category, listener: &Arc<L>) -> bool {
        let removed = {
            let mut slots = self.write_slots();
            let optimized = self.is_optimized();
            let Some(slot) = slots.get_mut(category) else {
                return false;
            };
            let Some(pos) = slot.entries.iter().position(|e| e.holds(listener)) else {
                return false;
            };
            let removed = slot.entries.remove(pos);
            if slot.entries.is_empty() {
                slots.remove(category);
            } else {
                slot.refresh(optimized);
            }
            removed
        };
        trace!(
            registry = self.id.get(),
            category = %category,
            listener = listener.name(),
            "listener unregistered"
        );
        self.run_hook(category, removed.listener(), FailurePhase::Detach);
        true
    }

    fn unregister_category(&self, category: &Category) -> usize {
        let Some(slot) = self.write_slots().remove(category) else {
            return 0;
        };
        self.detach_all(category, slot.entries)
    }

    fn unregister_all(&self) -> usize {
        let drained: Vec<(Category, Slot<L>)> = self.write_slots().drain().collect();
        let count = drained
            .into_iter()
            .map(|(category, slot)| self.detach_all(&category, slot.entries))
            .sum();
        debug!(registry = self.id.get(), removed = count, "registry cleared");
        count
    }

    fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.read_slots().keys().cloned().collect();
        categories.sort_unstable();
        categories
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::routing::router;
    use crate::test_support::{Behavior, Journal, Ping, Probe};

    fn cat(name: &str) -> Category {
        Category::new(name)
    }

    fn labels(snapshot: &Snapshot<dyn Ping>) -> Vec<&'static str> {
        snapshot.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn test_insertion_order_preserved() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        for label in ["l1", "l2", "l3"] {
            reg.register(&cat("c"), Probe::new(label, &journal)).unwrap();
        }
        assert_eq!(labels(&reg.snapshot(&cat("c"))), ["l1", "l2", "l3"]);
        assert!(reg.is_sequential());
    }

    #[test]
    fn test_empty_category_is_invalid() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        let err = reg.register(&cat(""), Probe::new("x", &journal)).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument { what: "category" }));
    }

    #[test]
    fn test_snapshot_isolation() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        reg.register(&cat("c"), Probe::new("old", &journal)).unwrap();

        let before = reg.snapshot(&cat("c"));
        reg.register(&cat("c"), Probe::new("new", &journal)).unwrap();

        assert_eq!(labels(&before), ["old"]);
        assert_eq!(labels(&reg.snapshot(&cat("c"))), ["old", "new"]);
    }

    #[test]
    fn test_absent_category_snapshot_is_empty() {
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        assert!(reg.snapshot(&cat("nothing")).is_empty());
        assert_eq!(reg.listener_count(&cat("nothing")), 0);
    }

    #[test]
    fn test_idempotent_removal_and_pruning() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        let probe = Probe::new("p", &journal);
        let handle: Arc<dyn Ping> = probe.clone();
        reg.register(&cat("c"), handle.clone()).unwrap();

        assert!(reg.unregister(&cat("c"), &handle));
        assert!(!reg.unregister(&cat("c"), &handle));
        assert!(!reg.unregister(&cat("other"), &handle));
        assert_eq!(probe.detached(), 1);
        assert!(reg.categories().is_empty());
    }

    #[test]
    fn test_duplicate_registration_removed_one_at_a_time() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        let handle: Arc<dyn Ping> = Probe::new("p", &journal);
        reg.register(&cat("c"), handle.clone()).unwrap();
        reg.register(&cat("c"), handle.clone()).unwrap();

        assert!(reg.unregister(&cat("c"), &handle));
        assert_eq!(reg.listener_count(&cat("c")), 1);
    }

    #[test]
    fn test_hooks_called_and_failures_routed() {
        let journal = Journal::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new().with_exception_router(
            router(move |ctx: &ExceptionContext<'_, dyn Ping>| {
                sink.lock().unwrap().push((ctx.phase, ctx.error.as_message()));
                Ok(())
            }),
        );

        let fails = Probe::with("fails", &journal, Behavior::FailAttach);
        let panics = Probe::with("panics", &journal, Behavior::PanicDetach);
        let fails_h: Arc<dyn Ping> = fails.clone();
        let panics_h: Arc<dyn Ping> = panics.clone();

        reg.register(&cat("c"), fails_h.clone()).unwrap();
        reg.register(&cat("c"), panics_h.clone()).unwrap();
        assert_eq!(fails.attached(), 1);
        assert_eq!(panics.attached(), 1);

        assert!(reg.unregister(&cat("c"), &panics_h));
        assert_eq!(panics.detached(), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (FailurePhase::Attach, "attach refused".to_string()),
                (FailurePhase::Detach, "detach exploded".to_string()),
            ]
        );
    }

    #[test]
    fn test_close_detaches_every_listener_once() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        let a = Probe::new("a", &journal);
        let b = Probe::new("b", &journal);
        reg.register(&cat("x"), a.clone()).unwrap();
        reg.register(&cat("y"), a.clone()).unwrap();
        reg.register(&cat("y"), b.clone()).unwrap();

        ListenerRegistry::close(&reg);

        assert_eq!(a.detached(), 2);
        assert_eq!(b.detached(), 1);
        assert!(reg.categories().is_empty());
        assert!(reg.snapshot(&cat("y")).is_empty());
    }

    #[test]
    fn test_unregister_category_only_touches_that_category() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        reg.register(&cat("x"), Probe::new("a", &journal)).unwrap();
        reg.register(&cat("x"), Probe::new("b", &journal)).unwrap();
        reg.register(&cat("y"), Probe::new("c", &journal)).unwrap();

        assert_eq!(reg.unregister_category(&cat("x")), 2);
        assert_eq!(reg.unregister_category(&cat("x")), 0);
        assert_eq!(reg.categories(), vec![cat("y")]);
    }

    #[test]
    fn test_optimized_snapshots_share_storage() {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        reg.register(&cat("c"), Probe::new("a", &journal)).unwrap();

        assert!(reg.optimize());
        assert!(!reg.optimize());
        assert!(reg.is_optimized());

        let s1 = reg.snapshot(&cat("c"));
        let s2 = reg.snapshot(&cat("c"));
        assert!(Arc::ptr_eq(&s1, &s2));

        reg.register(&cat("c"), Probe::new("b", &journal)).unwrap();
        let s3 = reg.snapshot(&cat("c"));
        assert_eq!(labels(&s1), ["a"]);
        assert_eq!(labels(&s3), ["a", "b"]);
    }

    #[test]
    fn test_concurrent_register_and_snapshot() {
        let journal = Journal::default();
        let reg: Arc<SequentialRegistry<dyn Ping>> = Arc::new(SequentialRegistry::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let journal = journal.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        reg.register(&cat("c"), Probe::new("w", &journal)).unwrap();
                        let _ = reg.snapshot(&cat("c")).len();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(reg.listener_count(&cat("c")), 200);
    }
}
