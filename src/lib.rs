//! # eventvisor
//!
//! **Eventvisor** is an in-process publish/notify engine for Rust.
//!
//! Producers hand an [`Event`] to a [`Dispatcher`]; the dispatcher notifies the
//! listeners registered for the event's [`Category`] by calling a [`Delivery`]
//! function once per listener. Where the deliveries run (caller thread, one
//! background worker, one task per listener) is a strategy; the core contract
//! is the same for all of them:
//! - listeners are notified from an immutable **snapshot** taken per call;
//! - one failing or panicking listener never stops the others (failures go to
//!   an [`ExceptionRouter`]);
//! - a listener dispatching from inside a delivery is tracked on the
//!   [`EventStack`], which lets an event **prevent cascades** of chosen categories.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer                                 application wiring
//!      │                                            │ register / unregister
//!      │ dispatch(event, delivery)                  ▼
//!      ▼                               ┌───────────────────────────┐
//! ┌─────────────────────────┐ snapshot │ ListenerRegistry          │
//! │ Dispatcher              │─────────►│  SequentialRegistry       │
//! │  InlineDispatcher       │          │  PriorityRegistry         │
//! │  WorkerDispatcher       │          │  ChainOfResponsibility<S> │
//! │  FanOutDispatcher       │          └───────────────────────────┘
//! │                         │ push/pop ┌───────────────────────────┐
//! │                         │─────────►│ EventStack (frames)       │
//! └───────────┬─────────────┘          └───────────────────────────┘
//!             │ delivery(listener, event)
//!      ┌──────┼──────────┐
//!      ▼      ▼          ▼
//!   listener listener  listener ──► Err / panic ──► ExceptionRouter (LogRouter by default)
//! ```
//!
//! ### Dispatch call
//! ```text
//! dispatch(event)
//!   ├─► closed? ───────────────────────────────► Ok(Skipped)
//!   ├─► active frame suppresses category? ─────► Ok(Prevented)
//!   ├─► snapshot(category), bind event to registry (single use)
//!   ├─► push frame
//!   ├─► deliver (strategy)
//!   │     ├─ handled ─► stop (sequential strategies)
//!   │     ├─ Err / panic ─► router ─► next listener
//!   │     └─ Abort ─► stop ─► Err(Aborted) (inline)
//!   └─► pop frame (guard, also on unwinding)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                                   |
//! |-------------------|----------------------------------------------------------------|------------------------------------------------------|
//! | **Listeners**     | Capability traits, attach/detach hooks, identity by `Arc`.     | [`Listener`], [`ListenerEntry`]                      |
//! | **Registries**    | Per-category ordered storage, snapshots, ordering decorators.  | [`SequentialRegistry`], [`PriorityRegistry`], [`ChainOfResponsibility`] |
//! | **Dispatch**      | Inline, single-worker and fan-out strategies.                  | [`Dispatcher`], [`InlineDispatcher`], [`WorkerDispatcher`], [`FanOutDispatcher`] |
//! | **Events**        | Payload, flags, cause chain, properties, cascade control.      | [`Event`], [`EventStack`]                            |
//! | **Routing**       | Failure handling for listeners.                                | [`ExceptionRouter`], [`LogRouter`], [`FailureRecord`] |
//! | **Errors**        | Typed errors for callers, listeners and stack invariants.      | [`DispatchError`], [`ListenerError`], [`StackError`] |
//! | **Configuration** | Grace period and fan-out mode of worker-backed strategies.     | [`Config`]                                           |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{
//!     Category, Dispatcher, Event, InlineDispatcher, Listener, ListenerError,
//!     ListenerRegistry, PriorityRegistry, delivery,
//! };
//!
//! trait OrderListener: Listener {
//!     fn order_placed(&self, ev: &Event) -> Result<(), ListenerError>;
//! }
//!
//! struct Mailer;
//! impl Listener for Mailer {
//!     fn name(&self) -> &'static str { "mailer" }
//! }
//! impl OrderListener for Mailer {
//!     fn order_placed(&self, ev: &Event) -> Result<(), ListenerError> {
//!         let id = ev.source::<u64>().ok_or_else(|| ListenerError::failed("no order id"))?;
//!         println!("mail for order {id}");
//!         Ok(())
//!     }
//! }
//!
//! struct Fraud;
//! impl Listener for Fraud {}
//! impl OrderListener for Fraud {
//!     fn order_placed(&self, ev: &Event) -> Result<(), ListenerError> {
//!         if ev.source::<u64>() == Some(&13) {
//!             ev.set_handled(); // nobody after us hears about this one
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let orders = Category::new("order");
//! let registry: Arc<PriorityRegistry<dyn OrderListener>> = Arc::new(PriorityRegistry::new());
//! registry.register_with_priority(&orders, Arc::new(Mailer), 10)?;
//! registry.register_with_priority(&orders, Arc::new(Fraud), 0)?;
//!
//! let dispatcher = InlineDispatcher::new(Arc::clone(&registry));
//! let placed = delivery::<dyn OrderListener, _>(|l, ev| l.order_placed(ev));
//!
//! dispatcher.dispatch(Event::new(7u64, "order").into_arc(), placed.clone())?;
//! dispatcher.dispatch(Event::new(13u64, "order").into_arc(), placed)?;
//! dispatcher.close();
//! # Ok::<(), eventvisor::DispatchError>(())
//! ```
mod core;
mod error;
mod events;
mod listeners;
mod routing;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use crate::core::{
    Config, Delivery, DispatchOutcome, Dispatcher, FanOutDispatcher, InlineDispatcher,
    WorkerDispatcher, delivery,
};
pub use error::{BoxError, DispatchError, ListenerError, StackError};
pub use events::{Category, DispatchFrame, Event, EventStack, FrameGuard, Properties};
pub use listeners::{
    ChainOfResponsibility, DEFAULT_PRIORITY, Listener, ListenerEntry, ListenerRegistry,
    ListenerSource, PriorityRegistry, RegistryId, SequentialRegistry, Snapshot, same_listener,
};
pub use routing::{
    ExceptionContext, ExceptionRouter, FailurePhase, FailureRecord, FailureSink, FnRouter,
    LogRouter, RouterRef, TracingSink, default_router, panic_message, router,
};
