//! # Dispatch contract and the algorithm shared by every strategy.
//!
//! A [`Dispatcher`] delivers one [`Event`] to the listeners registered for its
//! category by calling a [`Delivery`] function once per listener. Strategies
//! differ only in *where* and *in which order* the deliveries run; the steps
//! around them live in `DispatchCore` and are identical for all of them.
//!
//! ## Algorithm
//! ```text
//! dispatch(event, delivery[, router])
//!   ├─► !can_dispatch()                 ─► Ok(Skipped)
//!   ├─► stack.prevent_dispatch(category) ─► mark prevented, record on frame ─► Ok(Prevented)
//!   ├─► event.bind_registry(id)          ─► already bound ─► Err(InvalidArgument)
//!   ├─► registry.snapshot(category)      (inside the job for the worker strategy)
//!   ├─► push DispatchFrame (FrameGuard)
//!   ├─► deliver per strategy:
//!   │     for listener in snapshot:
//!   │       handled? ─► stop (sequential strategies)
//!   │       delivery(listener, event)
//!   │         ├─ Ok
//!   │         ├─ Err(Abort) ─────────────────────────► stop, Aborted (inline)
//!   │         └─ Err / panic ─► router.route(ctx) ──► Abort? stop : next
//!   └─► FrameGuard drop pops the frame (also on unwinding)
//! ```
//!
//! ## Rules
//! - A snapshot is taken once per call; registry changes made by listeners
//!   never affect the running call.
//! - An event is single use: its registry back-reference is set by the first
//!   dispatch that gets past the cascade check.
//! - No registry or stack lock is held while a delivery runs.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::error::{DispatchError, ListenerError};
use crate::events::{DispatchFrame, Event, EventStack};
use crate::listeners::{Listener, ListenerRegistry, Snapshot};
use crate::routing::{
    ExceptionContext, ExceptionRouter, RouterRef, default_router, guarded, route_failure,
};

/// Function value invoking the listener capability for one event.
pub type Delivery<L> = Arc<dyn Fn(&L, &Event) -> Result<(), ListenerError> + Send + Sync>;

/// Builds a [`Delivery`] from a closure.
///
/// # Example
/// ```rust
/// use eventvisor::{Delivery, Event, Listener, ListenerError, delivery};
///
/// trait OrderListener: Listener {
///     fn order_placed(&self, ev: &Event) -> Result<(), ListenerError>;
/// }
///
/// let placed: Delivery<dyn OrderListener> =
///     delivery::<dyn OrderListener, _>(|l, ev| l.order_placed(ev));
/// # let _ = placed;
/// ```
pub fn delivery<L, F>(f: F) -> Delivery<L>
where
    L: ?Sized,
    F: Fn(&L, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What a successful `dispatch` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The dispatcher is closed; nothing was delivered.
    Skipped,
    /// An active frame suppresses the category; see [`Event::is_prevented`].
    Prevented,
    /// Deliveries completed on the calling thread (or were awaited).
    Delivered {
        /// Listeners invoked (stops early once the event is handled).
        notified: usize,
    },
    /// Handed to the background worker.
    Queued,
    /// One delivery task per listener was submitted; the call did not wait.
    Submitted {
        /// Number of delivery tasks.
        tasks: usize,
    },
}

impl DispatchOutcome {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchOutcome::Skipped => "skipped",
            DispatchOutcome::Prevented => "prevented",
            DispatchOutcome::Delivered { .. } => "delivered",
            DispatchOutcome::Queued => "queued",
            DispatchOutcome::Submitted { .. } => "submitted",
        }
    }
}

/// # Dispatch coordinator contract.
///
/// Implemented by [`InlineDispatcher`](crate::InlineDispatcher),
/// [`WorkerDispatcher`](crate::WorkerDispatcher) and
/// [`FanOutDispatcher`](crate::FanOutDispatcher).
pub trait Dispatcher<L: Listener + ?Sized>: Send + Sync {
    /// Dispatches `event` using the dispatcher's default router.
    ///
    /// ### Errors
    /// - [`DispatchError::InvalidArgument`]: empty category or event already dispatched.
    /// - [`DispatchError::Aborted`]: abort signal during an inline delivery.
    /// - [`DispatchError::Interrupted`]: blocking fan-out wait interrupted.
    fn dispatch(
        &self,
        event: Arc<Event>,
        delivery: Delivery<L>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let router = self.default_router();
        self.dispatch_with(event, delivery, router)
    }

    /// Dispatches `event`, routing listener failures to `router`.
    fn dispatch_with(
        &self,
        event: Arc<Event>,
        delivery: Delivery<L>,
        router: RouterRef<L>,
    ) -> Result<DispatchOutcome, DispatchError>;

    /// Router used by [`dispatch`](Self::dispatch).
    fn default_router(&self) -> RouterRef<L>;

    /// Replaces the default router (`None` restores the logging router).
    fn set_default_router(&self, router: Option<RouterRef<L>>);

    /// False once the dispatcher stopped accepting work.
    fn can_dispatch(&self) -> bool;

    /// True if listeners are notified one at a time in registration order.
    fn is_sequential(&self) -> bool;

    /// Stack of active dispatch frames.
    fn event_stack(&self) -> &Arc<EventStack>;

    /// Clears the registry and stops accepting work (waiting for pending work
    /// where the strategy has any).
    fn close(&self);
}

/// State and steps shared by all strategies.
pub(crate) struct DispatchCore<L: ?Sized> {
    registry: Arc<dyn ListenerRegistry<L>>,
    stack: Arc<EventStack>,
    router: RwLock<RouterRef<L>>,
}

impl<L: Listener + ?Sized> DispatchCore<L> {
    pub(crate) fn new(registry: Arc<dyn ListenerRegistry<L>>) -> Self {
        Self {
            registry,
            stack: Arc::new(EventStack::new()),
            router: RwLock::new(default_router()),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<dyn ListenerRegistry<L>> {
        &self.registry
    }

    pub(crate) fn stack(&self) -> &Arc<EventStack> {
        &self.stack
    }

    pub(crate) fn router(&self) -> RouterRef<L> {
        Arc::clone(&self.router.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn set_router(&self, router: Option<RouterRef<L>>) {
        *self.router.write().unwrap_or_else(PoisonError::into_inner) =
            router.unwrap_or_else(default_router);
    }

    /// Cascade check: true if an active frame suppresses the event's category.
    pub(crate) fn prevent(&self, event: &Arc<Event>) -> bool {
        let Some(frame) = self.stack.prevent_dispatch(event.category()) else {
            return false;
        };
        event.mark_prevented();
        frame.record_prevented(Arc::clone(event));
        trace!(
            event_seq = event.seq,
            category = %event.category(),
            suppressed_by = frame.event().seq,
            "cascading dispatch prevented"
        );
        true
    }

    /// Validates the event and binds it to this registry.
    pub(crate) fn bind(&self, event: &Event) -> Result<(), DispatchError> {
        if event.category().is_empty() {
            return Err(DispatchError::InvalidArgument {
                what: "event category",
            });
        }
        if !event.bind_registry(self.registry.id()) {
            return Err(DispatchError::InvalidArgument {
                what: "event already dispatched",
            });
        }
        Ok(())
    }

    /// Point-in-time copy of the listeners of the event's category.
    pub(crate) fn snapshot(&self, event: &Event) -> Snapshot<L> {
        let listeners = self.registry.snapshot(event.category());
        trace!(
            event_seq = event.seq,
            category = %event.category(),
            listeners = listeners.len(),
            "dispatch started"
        );
        listeners
    }

    /// [`bind`](Self::bind) followed by [`snapshot`](Self::snapshot).
    pub(crate) fn prepare(&self, event: &Event) -> Result<Snapshot<L>, DispatchError> {
        self.bind(event)?;
        Ok(self.snapshot(event))
    }

    /// Delivers to each listener in order inside one frame.
    ///
    /// Stops when the event is handled; returns the abort signal if one was raised.
    pub(crate) fn run_sequential(
        &self,
        event: &Arc<Event>,
        listeners: &[Arc<L>],
        delivery: &Delivery<L>,
        router: &dyn ExceptionRouter<L>,
    ) -> Result<usize, ListenerError> {
        let _frame = self.stack.push(Arc::new(DispatchFrame::new(Arc::clone(event))));
        let mut notified = 0;
        for listener in listeners {
            if event.is_handled() {
                trace!(event_seq = event.seq, notified, "event handled; remaining listeners skipped");
                break;
            }
            notified += 1;
            deliver_one(listener, event, delivery, router)?;
        }
        Ok(notified)
    }
}

/// One delivery with failure isolation.
///
/// Returns `Err` only for an abort signal (raised by the listener or by the router).
pub(crate) fn deliver_one<L: Listener + ?Sized>(
    listener: &Arc<L>,
    event: &Arc<Event>,
    delivery: &Delivery<L>,
    router: &dyn ExceptionRouter<L>,
) -> Result<(), ListenerError> {
    match guarded(|| delivery(listener.as_ref(), event.as_ref())) {
        Ok(()) => Ok(()),
        Err(signal) if signal.is_abort() => {
            trace!(listener = listener.name(), event_seq = event.seq, "listener raised abort");
            Err(signal)
        }
        Err(err) => route_failure(router, &ExceptionContext::delivery(&err, listener, event)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Category;
    use crate::listeners::{ListenerSource, SequentialRegistry};
    use crate::test_support::{Behavior, Journal, Ping, Probe, capture, ping};

    fn core_with(probes: Vec<Arc<Probe>>) -> DispatchCore<dyn Ping> {
        let reg: Arc<SequentialRegistry<dyn Ping>> = Arc::new(SequentialRegistry::new());
        for p in probes {
            reg.register(&Category::new("ping"), p).unwrap();
        }
        DispatchCore::<dyn Ping>::new(reg)
    }

    #[test]
    fn test_prepare_binds_once() {
        let journal = Journal::default();
        let core = core_with(vec![Probe::new("a", &journal)]);
        let ev = Event::new((), "ping").into_arc();

        assert_eq!(core.prepare(&ev).unwrap().len(), 1);
        assert_eq!(ev.registry(), Some(core.registry().id()));
        assert!(matches!(
            core.prepare(&ev),
            Err(DispatchError::InvalidArgument { what: "event already dispatched" })
        ));
    }

    #[test]
    fn test_prepare_rejects_empty_category() {
        let core = core_with(Vec::new());
        let ev = Event::new((), "").into_arc();
        assert!(matches!(
            core.prepare(&ev),
            Err(DispatchError::InvalidArgument { what: "event category" })
        ));
    }

    #[test]
    fn test_deliver_one_routes_failures_and_panics() {
        let journal = Journal::default();
        let (router, seen) = capture();
        let ev = Event::new((), "ping").into_arc();

        let failing: Arc<dyn Ping> = Probe::with("f", &journal, Behavior::Fail("boom"));
        let panicking: Arc<dyn Ping> = Probe::with("p", &journal, Behavior::Panic("kaboom"));
        assert!(deliver_one(&failing, &ev, &ping(), router.as_ref()).is_ok());
        assert!(deliver_one(&panicking, &ev, &ping(), router.as_ref()).is_ok());

        assert_eq!(*seen.lock().unwrap(), ["f: boom", "p: kaboom"]);
    }

    #[test]
    fn test_run_sequential_balances_stack_on_abort() {
        let journal = Journal::default();
        let core = core_with(vec![
            Probe::new("a", &journal),
            Probe::with("b", &journal, Behavior::Abort),
            Probe::new("c", &journal),
        ]);
        let ev = Event::new((), "ping").into_arc();
        let listeners = core.prepare(&ev).unwrap();

        let res = core.run_sequential(&ev, &listeners, &ping(), core.router().as_ref());
        assert!(res.unwrap_err().is_abort());
        assert_eq!(journal.entries(), ["a", "b"]);
        assert!(core.stack().is_empty());
    }

    #[test]
    fn test_prevent_records_on_suppressing_frame() {
        let core = core_with(Vec::new());
        let outer = Event::new((), "order").preventing("audit").into_arc();
        let _frame = core.stack().push(Arc::new(DispatchFrame::new(Arc::clone(&outer))));

        let inner = Event::new((), "audit").into_arc();
        let other = Event::new((), "mail").into_arc();
        assert!(core.prevent(&inner));
        assert!(!core.prevent(&other));

        assert!(inner.is_prevented());
        assert!(!other.is_prevented());
        let recorded = outer.prevented_events();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].seq, inner.seq);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(DispatchOutcome::Delivered { notified: 1 }.as_label(), "delivered");
        assert_eq!(DispatchOutcome::Submitted { tasks: 2 }.as_label(), "submitted");
    }

    #[test]
    fn test_snapshot_is_value() {
        let journal = Journal::default();
        let core = core_with(vec![Probe::new("a", &journal)]);
        let ev = Event::new((), "ping").into_arc();
        let listeners = core.prepare(&ev).unwrap();
        core.registry()
            .register(&Category::new("ping"), Probe::new("late", &journal))
            .unwrap();

        assert_eq!(listeners.len(), 1);
        assert_eq!(core.registry().listener_count(&Category::new("ping")), 2);
    }
}
