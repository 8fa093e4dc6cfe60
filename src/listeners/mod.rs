//! # Listeners and the registries that hold them.
//!
//! This module provides the [`Listener`] trait, the registry traits, the base
//! [`SequentialRegistry`] and the ordering decorators.
//!
//! ## Architecture
//! ```text
//!                 ListenerRegistry (write side: register / unregister / close)
//!                        │
//!                 ListenerSource   (read side: snapshot / is_sequential)
//!          ┌─────────────┼──────────────────────┐
//!          ▼             ▼                      ▼
//!  SequentialRegistry  PriorityRegistry     ChainOfResponsibility<S>
//!  (append order)      (wraps Sequential,   (wraps any source,
//!                       ascending priority)  declared participants first)
//! ```
//!
//! ## Registry types
//! - **Sequential**: snapshot order is registration order (`is_sequential() == true`).
//! - **Decorators**: reorder or filter snapshots (`is_sequential() == false`).
//!
//! ## Implementing listeners
//! Define a capability trait extending [`Listener`], implement it, register the
//! `Arc<dyn Capability>` under explicit categories and dispatch with a delivery
//! function calling the capability method.

mod chain;
mod listener;
mod priority;
mod registry;

pub use chain::ChainOfResponsibility;
pub use listener::{Listener, ListenerEntry, same_listener};
pub use priority::{DEFAULT_PRIORITY, PriorityRegistry};
pub use registry::{ListenerRegistry, ListenerSource, RegistryId, SequentialRegistry, Snapshot};
