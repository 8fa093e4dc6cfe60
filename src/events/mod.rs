//! Events: data model and dispatch stack.
//!
//! This module groups the event **data model** and the **stack** of active
//! dispatch calls used for cascade detection.
//!
//! ## Contents
//! - [`Category`] tag grouping listeners notified together
//! - [`Event`], [`Properties`] single-use payload with flags, cause and property bag
//! - [`EventStack`], [`DispatchFrame`], [`FrameGuard`] active dispatch frames
//!
//! ## Quick reference
//! - **Producers** build an [`Event`] per dispatch call and hand it to a
//!   [`Dispatcher`](crate::Dispatcher).
//! - **Dispatchers** own one [`EventStack`] each and push/pop a frame around delivery.
//! - **Listeners** mark events handled, suppress cascades, or read the cause chain.

mod category;
mod event;
mod properties;
mod stack;

pub use category::Category;
pub use event::Event;
pub use properties::Properties;
pub use stack::{DispatchFrame, EventStack, FrameGuard};
