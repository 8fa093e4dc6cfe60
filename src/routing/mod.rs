//! # Exception routing for listener failures.
//!
//! This module provides the [`ExceptionRouter`] trait, the default
//! [`LogRouter`], and the diagnostics used to describe a failure.
//!
//! ## Architecture
//! ```text
//! deliver(listener, event)
//!     │
//!     ├─ Ok ──────────────────────────► next listener
//!     ├─ Err(Abort) ──────────────────► stop, DispatchError::Aborted (inline only)
//!     └─ Err(Failed) / panic ─► ExceptionContext ─► router.route(&ctx)
//!                                                     ├─ Ok ─────────► next listener
//!                                                     ├─ Err(Abort) ─► stop, Aborted (inline only)
//!                                                     └─ Err / panic ► logged, next listener
//! ```
//!
//! ## Router types
//! - **Default**: [`LogRouter`] writes a [`FailureRecord`] to a [`FailureSink`]
//!   ([`TracingSink`] unless configured) and swallows the failure.
//! - **Custom**: implement [`ExceptionRouter`] or wrap a closure with [`router`].
//!
//! Each dispatcher and each registry holds its own default router; there is no
//! process-wide router.

mod diagnostics;
mod log;
mod router;

pub use diagnostics::{FailureRecord, FailureSink, TracingSink, panic_message};
pub use log::{LogRouter, default_router};
pub use router::{ExceptionContext, ExceptionRouter, FailurePhase, FnRouter, RouterRef, router};

pub(crate) use diagnostics::guarded;
pub(crate) use router::route_failure;
