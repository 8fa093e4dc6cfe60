//! # Bounded waits used by `close()`.
//!
//! `close()` is synchronous while the work it waits for lives on a tokio
//! runtime. [`drain_with_grace`] runs the timeout on that runtime and parks the
//! calling thread on the result.
//!
//! ## Rules
//! - The runtime must have its time driver enabled (`enable_time` / `enable_all`).
//! - The timer is created inside the spawned task; `tokio::time` futures built
//!   outside a runtime context panic.
//! - Must not be called from inside an async task of a `current_thread` runtime:
//!   the waiting thread would be the one that has to make progress.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;

/// Waits up to `grace` for `done` to complete on `runtime`.
///
/// Returns `true` if `done` completed in time.
pub(crate) fn drain_with_grace<F>(runtime: &Handle, done: F, grace: Duration) -> bool
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let waiter = runtime.spawn(async move { tokio::time::timeout(grace, done).await });
    matches!(futures::executor::block_on(waiter), Ok(Ok(_)))
}
