//! # FanOutDispatcher: one delivery task per listener.
//!
//! Every listener of the snapshot gets its own `spawn_blocking` task, tracked by
//! a [`TaskTracker`]. Deliveries run concurrently; there is no ordering between
//! listeners and no early stop on `handled`.
//!
//! ## Architecture
//! ```text
//! dispatch(event)
//!   ├─► cascade check, snapshot + bind (caller thread)
//!   ├─► push frame
//!   │     ├──► spawn_blocking ──► delivery(l1, event) ──► countdown -1
//!   │     ├──► spawn_blocking ──► delivery(l2, event) ──► countdown -1
//!   │     └──► spawn_blocking ──► delivery(lN, event) ──► countdown -1
//!   ├─► non-blocking: pop frame ─► Ok(Submitted { tasks: N })
//!   └─► blocking:     select { countdown == 0 ─► pop ─► Ok(Delivered { notified: N })
//!                              interrupt     ─► abort pending ─► pop ─► Err(Interrupted) }
//! ```
//!
//! ## Rules
//! - `is_sequential()` is always false.
//! - The frame is active for the duration of the `dispatch` call: while tasks
//!   are submitted, and in blocking mode until they finished.
//! - Abort signals are not supported here; they are logged and ignored.
//! - `close()` stops accepting work and waits up to [`Config::grace`] for
//!   running deliveries.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use crate::core::config::Config;
use crate::core::dispatcher::{Delivery, DispatchCore, DispatchOutcome, Dispatcher, deliver_one};
use crate::core::shutdown::drain_with_grace;
use crate::error::DispatchError;
use crate::events::{DispatchFrame, Event, EventStack};
use crate::listeners::{Listener, ListenerRegistry};
use crate::routing::RouterRef;

/// Counts outstanding deliveries of one dispatch call.
struct Countdown {
    remaining: AtomicUsize,
    zero: Notify,
}

impl Countdown {
    fn new(n: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(n),
            zero: Notify::new(),
        }
    }

    fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.zero.notify_one();
        }
    }

    async fn wait(&self) {
        while self.remaining() > 0 {
            self.zero.notified().await;
        }
    }
}

/// Decrements the countdown when the delivery task ends, however it ends
/// (completion, panic, or abort before it started).
struct Arrival(Arc<Countdown>);

impl Drop for Arrival {
    fn drop(&mut self) {
        self.0.arrive();
    }
}

/// Parallel dispatcher with one blocking task per listener.
pub struct FanOutDispatcher<L: ?Sized> {
    core: Arc<DispatchCore<L>>,
    tracker: TaskTracker,
    runtime: Handle,
    cfg: Config,
}

impl<L: Listener + ?Sized> FanOutDispatcher<L> {
    /// Creates a dispatcher over `registry` submitting deliveries to `runtime`.
    ///
    /// `cfg.blocking_fan_out` selects the blocking mode; `cfg.interrupt` is the
    /// token that can end a blocking wait early.
    pub fn new<R>(registry: Arc<R>, runtime: Handle, cfg: Config) -> Self
    where
        R: ListenerRegistry<L> + 'static,
    {
        Self {
            core: Arc::new(DispatchCore::<L>::new(registry)),
            tracker: TaskTracker::new(),
            runtime,
            cfg,
        }
    }

    /// Number of delivery tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every pending delivery to finish. Returns `false` after `interrupt`.
    fn wait(&self, countdown: &Countdown) -> bool {
        match &self.cfg.interrupt {
            Some(interrupt) => futures::executor::block_on(async {
                tokio::select! {
                    biased;
                    _ = countdown.wait() => true,
                    _ = interrupt.cancelled() => false,
                }
            }),
            None => {
                futures::executor::block_on(countdown.wait());
                true
            }
        }
    }

    fn submit(
        &self,
        event: &Arc<Event>,
        listeners: &[Arc<L>],
        delivery: &Delivery<L>,
        router: &RouterRef<L>,
        countdown: &Arc<Countdown>,
    ) -> Vec<AbortHandle> {
        listeners
            .iter()
            .map(|listener| {
                let arrival = Arrival(Arc::clone(countdown));
                let listener = Arc::clone(listener);
                let event = Arc::clone(event);
                let delivery = Arc::clone(delivery);
                let router = Arc::clone(router);
                let task = self.tracker.spawn_blocking_on(
                    move || {
                        let _arrival = arrival;
                        if let Err(signal) = deliver_one(&listener, &event, &delivery, router.as_ref()) {
                            warn!(
                                listener = listener.name(),
                                event_seq = event.seq,
                                reason = %signal,
                                "abort signal not supported by fan-out dispatch; ignored"
                            );
                        }
                    },
                    &self.runtime,
                );
                task.abort_handle()
            })
            .collect()
    }
}

impl<L: Listener + ?Sized> Dispatcher<L> for FanOutDispatcher<L> {
    fn dispatch_with(
        &self,
        event: Arc<Event>,
        delivery: Delivery<L>,
        router: RouterRef<L>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if !self.can_dispatch() {
            return Ok(DispatchOutcome::Skipped);
        }
        if self.core.prevent(&event) {
            return Ok(DispatchOutcome::Prevented);
        }
        let listeners = self.core.prepare(&event)?;
        let tasks = listeners.len();
        let countdown = Arc::new(Countdown::new(tasks));

        let _frame = self
            .core
            .stack()
            .push(Arc::new(DispatchFrame::new(Arc::clone(&event))));
        let handles = self.submit(&event, &listeners, &delivery, &router, &countdown);

        if !self.cfg.blocking_fan_out {
            trace!(event_seq = event.seq, tasks, "fan-out submitted");
            return Ok(DispatchOutcome::Submitted { tasks });
        }
        if self.wait(&countdown) {
            trace!(event_seq = event.seq, tasks, "fan-out completed");
            return Ok(DispatchOutcome::Delivered { notified: tasks });
        }

        let pending = countdown.remaining();
        for handle in &handles {
            handle.abort();
        }
        warn!(event_seq = event.seq, pending, "fan-out wait interrupted");
        Err(DispatchError::Interrupted { pending })
    }

    fn default_router(&self) -> RouterRef<L> {
        self.core.router()
    }

    fn set_default_router(&self, router: Option<RouterRef<L>>) {
        self.core.set_router(router);
    }

    fn can_dispatch(&self) -> bool {
        !self.tracker.is_closed()
    }

    fn is_sequential(&self) -> bool {
        false
    }

    fn event_stack(&self) -> &Arc<EventStack> {
        self.core.stack()
    }

    /// Clears the registry, stops accepting work and waits for running deliveries.
    ///
    /// Blocks the calling thread for at most [`Config::grace`].
    fn close(&self) {
        self.core.registry().close();
        self.tracker.close();

        let Some(grace) = self.cfg.grace_period() else {
            return;
        };
        let tracker = self.tracker.clone();
        if drain_with_grace(&self.runtime, async move { tracker.wait().await }, grace) {
            debug!("fan-out dispatcher closed");
        } else {
            warn!(
                grace_ms = grace.as_millis() as u64,
                in_flight = self.tracker.len(),
                "fan-out deliveries still running after grace"
            );
        }
    }
}
