//! # Exception router contract
//!
//! `ExceptionRouter` is the extension point deciding what happens with a
//! listener failure. It is called on the thread that ran the listener, once per
//! failing delivery (or failing attach/detach hook), with a full
//! [`ExceptionContext`].
//!
//! ## Contract
//! - Returning `Ok(())` swallows the failure; the dispatch loop continues.
//! - Returning [`ListenerError::Abort`] terminates an inline dispatch call; the
//!   abort reaches the caller as [`DispatchError::Aborted`](crate::DispatchError::Aborted).
//! - Returning any other error, or panicking, is a router failure: it is logged
//!   and discarded, the loop continues.
//!
//! ## Example
//! ```rust
//! use eventvisor::{ExceptionContext, Listener, ListenerError, RouterRef, router};
//!
//! struct Audit;
//! impl Listener for Audit {}
//!
//! // Escalate everything to an abort.
//! let strict: RouterRef<Audit> = router(|ctx: &ExceptionContext<'_, Audit>| {
//!     Err(ListenerError::abort(ctx.error.as_message()))
//! });
//! # let _ = strict;
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{error, warn};

use crate::error::ListenerError;
use crate::events::{Category, Event};
use crate::listeners::Listener;
use crate::routing::diagnostics::panic_message;

/// Where a listener failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    /// While delivering an event.
    Delivery,
    /// Inside [`Listener::on_attach`].
    Attach,
    /// Inside [`Listener::on_detach`].
    Detach,
}

impl FailurePhase {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            FailurePhase::Delivery => "delivery",
            FailurePhase::Attach => "attach",
            FailurePhase::Detach => "detach",
        }
    }
}

/// Everything a router needs to know about one listener failure.
pub struct ExceptionContext<'a, L: ?Sized> {
    /// The failure.
    pub error: &'a ListenerError,
    /// The offending listener.
    pub listener: &'a Arc<L>,
    /// Event being delivered (`None` for attach/detach failures).
    pub event: Option<&'a Arc<Event>>,
    /// Category being delivered, attached or detached.
    pub category: &'a Category,
    /// Where the failure happened.
    pub phase: FailurePhase,
}

impl<'a, L: Listener + ?Sized> ExceptionContext<'a, L> {
    /// Context for a failed delivery.
    pub fn delivery(error: &'a ListenerError, listener: &'a Arc<L>, event: &'a Arc<Event>) -> Self {
        Self {
            error,
            listener,
            event: Some(event),
            category: event.category(),
            phase: FailurePhase::Delivery,
        }
    }

    /// Context for a failed attach/detach hook.
    pub fn hook(
        error: &'a ListenerError,
        listener: &'a Arc<L>,
        category: &'a Category,
        phase: FailurePhase,
    ) -> Self {
        Self {
            error,
            listener,
            event: None,
            category,
            phase,
        }
    }

    /// Name of the offending listener.
    pub fn listener_name(&self) -> &'static str {
        self.listener.name()
    }

    /// Name of the current thread (or its id when unnamed).
    pub fn thread_name(&self) -> String {
        let current = thread::current();
        match current.name() {
            Some(name) => name.to_owned(),
            None => format!("{:?}", current.id()),
        }
    }
}

/// Pluggable failure handler.
pub trait ExceptionRouter<L: ?Sized>: Send + Sync + 'static {
    /// Handle one listener failure.
    fn route(&self, ctx: &ExceptionContext<'_, L>) -> Result<(), ListenerError>;
}

/// Shared router handle.
pub type RouterRef<L> = Arc<dyn ExceptionRouter<L>>;

/// Router backed by a closure (see [`router`]).
pub struct FnRouter<F>(F);

impl<L, F> ExceptionRouter<L> for FnRouter<F>
where
    L: ?Sized,
    F: Fn(&ExceptionContext<'_, L>) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn route(&self, ctx: &ExceptionContext<'_, L>) -> Result<(), ListenerError> {
        (self.0)(ctx)
    }
}

/// Builds a [`RouterRef`] from a closure.
pub fn router<L, F>(f: F) -> RouterRef<L>
where
    L: ?Sized + 'static,
    F: Fn(&ExceptionContext<'_, L>) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(FnRouter(f))
}

/// Hands `ctx` to `router`, isolating router failures.
///
/// Returns `Err` only for an abort signal raised by the router.
pub(crate) fn route_failure<L: Listener + ?Sized>(
    router: &dyn ExceptionRouter<L>,
    ctx: &ExceptionContext<'_, L>,
) -> Result<(), ListenerError> {
    match panic::catch_unwind(AssertUnwindSafe(|| router.route(ctx))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(signal)) if signal.is_abort() => Err(signal),
        Ok(Err(err)) => {
            warn!(
                listener = ctx.listener_name(),
                phase = ctx.phase.as_label(),
                original = %ctx.error,
                label = err.as_label(),
                error = %err,
                "exception router failed; failure discarded"
            );
            Ok(())
        }
        Err(payload) => {
            error!(
                listener = ctx.listener_name(),
                phase = ctx.phase.as_label(),
                original = %ctx.error,
                panic = %panic_message(payload.as_ref()),
                "exception router panicked; failure discarded"
            );
            Ok(())
        }
    }
}
