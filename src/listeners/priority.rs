//! # PriorityRegistry: ascending-priority ordering
//!
//! Wraps a [`SequentialRegistry`] configured to insert by ascending priority.
//! Equal priorities keep registration order (stable). Listeners registered
//! without a priority get [`DEFAULT_PRIORITY`].
//!
//! ```text
//! register_with_priority(A, 2)   [A(2)]
//! register_with_priority(B, 1)   [B(1), A(2)]
//! register_with_priority(C, 1)   [B(1), C(1), A(2)]
//! register(D)                    [D(0), B(1), C(1), A(2)]
//! ```

use std::sync::Arc;

use crate::error::DispatchError;
use crate::events::Category;
use crate::listeners::registry::InsertOrder;
use crate::listeners::{
    Listener, ListenerEntry, ListenerRegistry, ListenerSource, RegistryId, SequentialRegistry,
    Snapshot,
};
use crate::routing::RouterRef;

/// Priority used by [`ListenerRegistry::register`] on a [`PriorityRegistry`].
pub const DEFAULT_PRIORITY: i32 = 0;

/// Registry notifying listeners by ascending priority.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use eventvisor::{Category, Listener, ListenerRegistry, ListenerSource, PriorityRegistry};
///
/// struct Named(&'static str);
/// impl Listener for Named {}
///
/// let reg: PriorityRegistry<Named> = PriorityRegistry::new();
/// let ping = Category::new("ping");
/// reg.register_with_priority(&ping, Arc::new(Named("a")), 2).unwrap();
/// reg.register_with_priority(&ping, Arc::new(Named("b")), 1).unwrap();
///
/// let order: Vec<&str> = reg.snapshot(&ping).iter().map(|l| l.0).collect();
/// assert_eq!(order, ["b", "a"]);
/// assert!(!reg.is_sequential());
/// ```
pub struct PriorityRegistry<L: ?Sized> {
    inner: SequentialRegistry<L>,
}

impl<L: Listener + ?Sized> PriorityRegistry<L> {
    /// Creates an empty priority registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SequentialRegistry::with_order(InsertOrder::Priority),
        }
    }

    /// See [`SequentialRegistry::set_exception_router`].
    pub fn set_exception_router(&self, router: Option<RouterRef<L>>) {
        self.inner.set_exception_router(router);
    }

    /// See [`SequentialRegistry::optimize`].
    pub fn optimize(&self) -> bool {
        self.inner.optimize()
    }

    /// Entries of `category` with priorities, in notification order.
    pub fn entries(&self, category: &Category) -> Vec<ListenerEntry<L>> {
        self.inner.entries(category)
    }
}

impl<L: Listener + ?Sized> Default for PriorityRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Listener + ?Sized> ListenerSource<L> for PriorityRegistry<L> {
    fn snapshot(&self, category: &Category) -> Snapshot<L> {
        self.inner.snapshot(category)
    }

    fn is_sequential(&self) -> bool {
        false
    }

    fn listener_count(&self, category: &Category) -> usize {
        self.inner.listener_count(category)
    }
}

impl<L: Listener + ?Sized> ListenerRegistry<L> for PriorityRegistry<L> {
    fn id(&self) -> RegistryId {
        self.inner.id()
    }

    fn register(&self, category: &Category, listener: Arc<L>) -> Result<(), DispatchError> {
        self.inner.insert(category, listener, DEFAULT_PRIORITY)
    }

    fn register_with_priority(
        &self,
        category: &Category,
        listener: Arc<L>,
        priority: i32,
    ) -> Result<(), DispatchError> {
        self.inner.insert(category, listener, priority)
    }

    fn unregister(&self, category: &Category, listener: &Arc<L>) -> bool {
        self.inner.unregister(category, listener)
    }

    fn unregister_category(&self, category: &Category) -> usize {
        self.inner.unregister_category(category)
    }

    fn unregister_all(&self) -> usize {
        self.inner.unregister_all()
    }

    fn categories(&self) -> Vec<Category> {
        self.inner.categories()
    }
}
