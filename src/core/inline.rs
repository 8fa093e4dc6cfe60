//! # InlineDispatcher: deliver on the calling thread.
//!
//! Listeners are notified one by one on the thread that called `dispatch`, in
//! snapshot order. The call returns after the last delivery.
//!
//! ## Rules
//! - Stops early once a listener marks the event handled.
//! - An abort signal (from a listener or from the router) ends the call with
//!   [`DispatchError::Aborted`]; the frame is still popped.
//! - Nested `dispatch` calls from inside a listener run on the same thread,
//!   on top of the current frame (cascade checks apply).
//! - `can_dispatch()` is always true; after `close()` the registry is empty.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{
//!     Category, Dispatcher, DispatchOutcome, Event, InlineDispatcher, Listener,
//!     ListenerError, ListenerRegistry, SequentialRegistry, delivery,
//! };
//!
//! trait Greeter: Listener {
//!     fn greet(&self, ev: &Event) -> Result<(), ListenerError>;
//! }
//!
//! struct Hello;
//! impl Listener for Hello {}
//! impl Greeter for Hello {
//!     fn greet(&self, _ev: &Event) -> Result<(), ListenerError> { Ok(()) }
//! }
//!
//! let registry: Arc<SequentialRegistry<dyn Greeter>> = Arc::new(SequentialRegistry::new());
//! registry.register(&Category::new("greet"), Arc::new(Hello)).unwrap();
//!
//! let dispatcher = InlineDispatcher::new(registry);
//! let outcome = dispatcher
//!     .dispatch(
//!         Event::new((), "greet").into_arc(),
//!         delivery::<dyn Greeter, _>(|l, ev| l.greet(ev)),
//!     )
//!     .unwrap();
//! assert_eq!(outcome, DispatchOutcome::Delivered { notified: 1 });
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::dispatcher::{Delivery, DispatchCore, DispatchOutcome, Dispatcher};
use crate::error::DispatchError;
use crate::events::{Event, EventStack};
use crate::listeners::{Listener, ListenerRegistry};
use crate::routing::RouterRef;

/// Sequential dispatcher running every delivery on the caller's thread.
pub struct InlineDispatcher<L: ?Sized> {
    core: DispatchCore<L>,
}

impl<L: Listener + ?Sized> InlineDispatcher<L> {
    /// Creates a dispatcher over `registry`.
    pub fn new<R>(registry: Arc<R>) -> Self
    where
        R: ListenerRegistry<L> + 'static,
    {
        Self {
            core: DispatchCore::<L>::new(registry),
        }
    }
}

impl<L: Listener + ?Sized> Dispatcher<L> for InlineDispatcher<L> {
    fn dispatch_with(
        &self,
        event: Arc<Event>,
        delivery: Delivery<L>,
        router: RouterRef<L>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if self.core.prevent(&event) {
            return Ok(DispatchOutcome::Prevented);
        }
        let listeners = self.core.prepare(&event)?;
        let notified = self
            .core
            .run_sequential(&event, &listeners, &delivery, router.as_ref())
            .map_err(DispatchError::aborted)?;

        trace!(event_seq = event.seq, notified, "inline dispatch finished");
        Ok(DispatchOutcome::Delivered { notified })
    }

    fn default_router(&self) -> RouterRef<L> {
        self.core.router()
    }

    fn set_default_router(&self, router: Option<RouterRef<L>>) {
        self.core.set_router(router);
    }

    fn can_dispatch(&self) -> bool {
        true
    }

    fn is_sequential(&self) -> bool {
        self.core.registry().is_sequential()
    }

    fn event_stack(&self) -> &Arc<EventStack> {
        self.core.stack()
    }

    fn close(&self) {
        self.core.registry().close();
        debug!(registry = self.core.registry().id().get(), "inline dispatcher closed");
    }
}
