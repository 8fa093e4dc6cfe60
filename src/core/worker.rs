//! # WorkerDispatcher: one background worker, submission order.
//!
//! Each `dispatch` call becomes one job in an unbounded mailbox. A single tokio
//! task drains the mailbox and runs every job through `spawn_blocking`, one at
//! a time, so delivery functions may block without stalling the runtime.
//!
//! ## Architecture
//! ```text
//! dispatch(event) ─► cascade check ─► bind ─► mailbox.send(job) ─► Ok(Queued)
//!                        (caller thread)             │
//!                                                    ▼
//!                     worker task: while let Some(job) = rx.recv()
//!                                    └─► spawn_blocking(job).await
//!                                          └─► snapshot, push frame, deliver in order, pop
//! ```
//!
//! ## Rules
//! - Jobs run strictly one after the other, in submission order.
//! - Validation and the single-use check run on the caller's thread; the
//!   snapshot is taken when the job starts, so listeners removed while a job
//!   waits in the mailbox (including by `close()`) are not notified.
//! - An abort signal stops the remaining deliveries of that job only; it is
//!   logged and never reaches the caller.
//! - `close()` clears the registry, closes the mailbox and waits up to
//!   [`Config::grace`] for queued jobs to finish.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::core::config::Config;
use crate::core::dispatcher::{Delivery, DispatchCore, DispatchOutcome, Dispatcher};
use crate::core::shutdown::drain_with_grace;
use crate::error::DispatchError;
use crate::events::{Event, EventStack};
use crate::listeners::{Listener, ListenerRegistry};
use crate::routing::{RouterRef, panic_message};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sequential dispatcher delivering on a single background worker.
pub struct WorkerDispatcher<L: ?Sized> {
    core: Arc<DispatchCore<L>>,
    mailbox: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    cfg: Config,
}

impl<L: Listener + ?Sized> WorkerDispatcher<L> {
    /// Creates a dispatcher over `registry` and spawns its worker on `runtime`.
    ///
    /// The runtime must have the time driver enabled (used by `close()`).
    pub fn new<R>(registry: Arc<R>, runtime: Handle, cfg: Config) -> Self
    where
        R: ListenerRegistry<L> + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = runtime.spawn(run_worker(rx));
        Self {
            core: Arc::new(DispatchCore::<L>::new(registry)),
            mailbox: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            runtime,
            cfg,
        }
    }

    fn mailbox(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Job>>> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Worker loop: runs jobs one at a time until every sender is gone.
async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        match tokio::task::spawn_blocking(job).await {
            Ok(()) => {}
            Err(err) if err.is_panic() => {
                error!(
                    panic = %panic_message(err.into_panic().as_ref()),
                    "dispatch job panicked"
                );
            }
            Err(err) => warn!(error = %err, "dispatch job cancelled"),
        }
    }
    debug!("dispatch worker stopped");
}

impl<L: Listener + ?Sized> Dispatcher<L> for WorkerDispatcher<L> {
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
        self.core.bind(&event)?;

        let core = Arc::clone(&self.core);
        let job_event = Arc::clone(&event);
        let job: Job = Box::new(move || {
            let listeners = core.snapshot(&job_event);
            match core.run_sequential(&job_event, &listeners, &delivery, router.as_ref()) {
                Ok(notified) => {
                    trace!(event_seq = job_event.seq, notified, "background dispatch finished");
                }
                Err(signal) => warn!(
                    event_seq = job_event.seq,
                    reason = %signal,
                    "abort signal ended background dispatch early"
                ),
            }
        });

        let queued = self
            .mailbox()
            .as_ref()
            .is_some_and(|tx| tx.send(job).is_ok());
        if queued {
            trace!(event_seq = event.seq, "dispatch queued");
            Ok(DispatchOutcome::Queued)
        } else {
            debug!(event_seq = event.seq, "worker gone; dispatch skipped");
            Ok(DispatchOutcome::Skipped)
        }
    }

    fn default_router(&self) -> RouterRef<L> {
        self.core.router()
    }

    fn set_default_router(&self, router: Option<RouterRef<L>>) {
        self.core.set_router(router);
    }

    fn can_dispatch(&self) -> bool {
        self.mailbox().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn is_sequential(&self) -> bool {
        self.core.registry().is_sequential()
    }

    fn event_stack(&self) -> &Arc<EventStack> {
        self.core.stack()
    }

    /// Clears the registry, closes the mailbox and waits for queued jobs.
    ///
    /// Blocks the calling thread for at most [`Config::grace`]. Must not be
    /// called from inside an async task of a `current_thread` runtime.
    fn close(&self) {
        self.core.registry().close();
        drop(self.mailbox().take());

        let Some(worker) = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return;
        };
        let abort = worker.abort_handle();
        match self.cfg.grace_period() {
            Some(grace) if drain_with_grace(&self.runtime, worker, grace) => {
                debug!("worker dispatcher closed");
            }
            Some(grace) => {
                warn!(grace_ms = grace.as_millis() as u64, "worker did not drain within grace; abandoning queued jobs");
                abort.abort();
            }
            None => abort.abort(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::core::delivery;
    use crate::events::Category;
    use crate::listeners::SequentialRegistry;
    use crate::test_support::{Behavior, Journal, Ping, Probe, capture, eventually, ping, runtime};

    fn setup(
        rt: &tokio::runtime::Runtime,
        probes: &[Arc<Probe>],
        cfg: Config,
    ) -> WorkerDispatcher<dyn Ping> {
        let reg: Arc<SequentialRegistry<dyn Ping>> = Arc::new(SequentialRegistry::new());
        for p in probes {
            reg.register(&Category::new("ping"), p.clone()).unwrap();
        }
        WorkerDispatcher::new(reg, rt.handle().clone(), cfg)
    }

    fn ping_event() -> Arc<Event> {
        Event::new((), "ping").into_arc()
    }

    #[test]
    fn test_jobs_run_in_submission_order_off_thread() {
        let rt = runtime();
        let journal = Journal::default();
        let d = Arc::new(setup(&rt, &[Probe::new("a", &journal), Probe::new("b", &journal)], Config::default()));

        let caller = thread::current().id();
        let threads = Arc::new(Mutex::new(Vec::new()));
        let seen_threads = Arc::clone(&threads);
        let deliver = delivery::<dyn Ping, _>(move |l, ev| {
            seen_threads.lock().unwrap().push(thread::current().id());
            l.ping(ev)
        });

        for _ in 0..3 {
            let outcome = d.dispatch(ping_event(), Arc::clone(&deliver)).unwrap();
            assert_eq!(outcome, DispatchOutcome::Queued);
        }
        assert!(eventually(|| journal.entries().len() == 6));
        d.close();

        assert_eq!(journal.entries(), ["a", "b", "a", "b", "a", "b"]);
        assert!(threads.lock().unwrap().iter().all(|id| *id != caller));
        assert!(d.event_stack().is_empty());
    }

    #[test]
    fn test_abort_is_swallowed_and_next_job_runs() {
        let rt = runtime();
        let journal = Journal::default();
        let probes = [
            Probe::with("a", &journal, Behavior::Abort),
            Probe::new("b", &journal),
        ];
        let d = setup(&rt, &probes, Config::default());

        assert_eq!(d.dispatch(ping_event(), ping()).unwrap(), DispatchOutcome::Queued);
        assert_eq!(d.dispatch(ping_event(), ping()).unwrap(), DispatchOutcome::Queued);
        assert!(eventually(|| journal.entries().len() == 2));
        d.close();

        assert_eq!(journal.entries(), ["a", "a"]);
    }

    #[test]
    fn test_failures_routed_on_worker() {
        let rt = runtime();
        let journal = Journal::default();
        let probes = [
            Probe::with("a", &journal, Behavior::Panic("worker boom")),
            Probe::new("b", &journal),
        ];
        let d = setup(&rt, &probes, Config::default());
        let (router, seen) = capture();

        d.dispatch_with(ping_event(), ping(), router).unwrap();
        assert!(eventually(|| journal.entries().len() == 2));
        d.close();

        assert_eq!(journal.entries(), ["a", "b"]);
        assert_eq!(*seen.lock().unwrap(), ["a: worker boom"]);
    }

    #[test]
    fn test_reused_event_rejected_synchronously() {
        let rt = runtime();
        let journal = Journal::default();
        let d = setup(&rt, &[Probe::new("a", &journal)], Config::default());
        let ev = ping_event();

        d.dispatch(Arc::clone(&ev), ping()).unwrap();
        let err = d.dispatch(ev, ping()).unwrap_err();
        assert!(eventually(|| journal.entries().len() == 1));
        d.close();

        assert!(matches!(err, DispatchError::InvalidArgument { .. }));
        assert_eq!(journal.entries(), ["a"]);
    }

    #[test]
    fn test_closed_dispatcher_skips() {
        let rt = runtime();
        let journal = Journal::default();
        let a = Probe::new("a", &journal);
        let d = setup(&rt, &[a.clone()], Config::default());
        assert!(d.can_dispatch());
        assert!(d.is_sequential());

        d.close();

        assert!(!d.can_dispatch());
        assert_eq!(a.detached(), 1);
        let ev = ping_event();
        assert_eq!(d.dispatch(Arc::clone(&ev), ping()).unwrap(), DispatchOutcome::Skipped);
        assert_eq!(ev.registry(), None);
        d.close();
    }

    #[test]
    fn test_listener_removed_while_queued_is_skipped() {
        let rt = runtime();
        let journal = Journal::default();
        let slow = Probe::with("slow", &journal, Behavior::Sleep(Duration::from_millis(200)));
        let b = Probe::new("b", &journal);
        let d = setup(&rt, &[slow, b.clone()], Config::default());

        d.dispatch(ping_event(), ping()).unwrap();
        d.dispatch(ping_event(), ping()).unwrap();
        thread::sleep(Duration::from_millis(50));
        let handle: Arc<dyn Ping> = b.clone();
        assert!(d.core.registry().unregister(&Category::new("ping"), &handle));
        assert_eq!(b.detached(), 1);
        d.close();

        assert_eq!(journal.entries(), ["slow", "b", "slow"]);
    }

    #[test]
    fn test_close_detaches_before_queued_jobs_run() {
        let rt = runtime();
        let journal = Journal::default();
        let slow = Probe::with("slow", &journal, Behavior::Sleep(Duration::from_millis(200)));
        let b = Probe::new("b", &journal);
        let d = setup(&rt, &[slow.clone(), b.clone()], Config::default());

        d.dispatch(ping_event(), ping()).unwrap();
        d.dispatch(ping_event(), ping()).unwrap();
        thread::sleep(Duration::from_millis(50));
        d.close();

        assert_eq!(slow.detached(), 1);
        assert_eq!(b.detached(), 1);
        assert_eq!(journal.entries(), ["slow", "b"]);
    }

    #[test]
    fn test_close_gives_up_after_grace() {
        let rt = runtime();
        let journal = Journal::default();
        let probes = [Probe::with("stuck", &journal, Behavior::Sleep(Duration::from_millis(800)))];
        let cfg = Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        };
        let d = setup(&rt, &probes, cfg);

        d.dispatch(ping_event(), ping()).unwrap();
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        d.close();

        assert!(started.elapsed() < Duration::from_millis(600));
        assert!(!d.can_dispatch());
    }

    #[test]
    fn test_cascade_prevented_on_worker() {
        let rt = runtime();
        let journal = Journal::default();
        let reg: Arc<SequentialRegistry<dyn Ping>> = Arc::new(SequentialRegistry::new());
        reg.register(&Category::new("order"), Probe::new("order", &journal)).unwrap();
        reg.register(&Category::new("audit"), Probe::new("audit", &journal)).unwrap();
        let d = Arc::new(WorkerDispatcher::new(reg, rt.handle().clone(), Config::default()));

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let (inner_d, inner_out) = (Arc::clone(&d), Arc::clone(&outcomes));
        let cascading = delivery::<dyn Ping, _>(move |l, ev| {
            let child = Event::new((), "audit").into_arc();
            inner_out.lock().unwrap().push(inner_d.dispatch(child, ping()).unwrap());
            l.ping(ev)
        });

        let order = Event::new((), "order").preventing("audit").into_arc();
        d.dispatch(Arc::clone(&order), cascading).unwrap();
        assert!(eventually(|| journal.entries() == ["order"]));
        d.close();

        assert_eq!(*outcomes.lock().unwrap(), [DispatchOutcome::Prevented]);
        assert_eq!(journal.entries(), ["order"]);
        assert_eq!(order.prevented_events().len(), 1);
    }
}
