//! # Core listener trait
//!
//! `Listener` is the base capability every listener implements. Concrete
//! capabilities are ordinary traits extending it (`trait OrderListener: Listener`),
//! registered per [`Category`] and invoked through a delivery function passed
//! to [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).
//!
//! ## Contract
//! - Listeners are identified by **reference identity** (`Arc` pointer), never by value.
//! - `on_attach` / `on_detach` run synchronously on the thread calling
//!   register/unregister; failures are routed, never returned to that caller.
//!
//! ## Example (skeleton)
//! ```rust
//! use eventvisor::{Category, Event, Listener, ListenerError};
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
//!     fn order_placed(&self, _ev: &Event) -> Result<(), ListenerError> { Ok(()) }
//! }
//! ```

use std::sync::Arc;

use crate::error::ListenerError;
use crate::events::Category;

/// Base contract for listeners.
pub trait Listener: Send + Sync + 'static {
    /// Called after the listener was added to `category`.
    fn on_attach(&self, _category: &Category) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Called after the listener was removed from `category`.
    fn on_detach(&self, _category: &Category) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Human-readable name (for logs/failure records).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Registered listener with its ordering keys.
pub struct ListenerEntry<L: ?Sized> {
    listener: Arc<L>,
    priority: i32,
    seq: u64,
}

impl<L: ?Sized> ListenerEntry<L> {
    pub(crate) fn new(listener: Arc<L>, priority: i32, seq: u64) -> Self {
        Self {
            listener,
            priority,
            seq,
        }
    }

    /// The listener.
    #[inline]
    pub fn listener(&self) -> &Arc<L> {
        &self.listener
    }

    /// Priority (lower is notified first in priority registries).
    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Registration sequence number (tie breaker).
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True if this entry holds exactly `listener` (same allocation).
    #[inline]
    pub fn holds(&self, listener: &Arc<L>) -> bool {
        same_listener(&self.listener, listener)
    }
}

impl<L: ?Sized> Clone for ListenerEntry<L> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            priority: self.priority,
            seq: self.seq,
        }
    }
}

/// Identity comparison of two listener handles (address only, vtables ignored).
#[inline]
pub fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
