//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::{Delivery, delivery};
use crate::error::ListenerError;
use crate::events::{Category, Event};
use crate::listeners::Listener;
use crate::routing::{ExceptionContext, RouterRef, router};

/// Capability used by tests.
pub(crate) trait Ping: Listener {
    fn ping(&self, ev: &Event) -> Result<(), ListenerError>;
}

/// How a [`Probe`] reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Record,
    Fail(&'static str),
    Panic(&'static str),
    Abort,
    Handle,
    Sleep(Duration),
    FailAttach,
    PanicDetach,
}

/// Ordered log of deliveries shared between probes.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    pub(crate) fn push(&self, label: &'static str) {
        self.0.lock().unwrap().push(label);
    }

    pub(crate) fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn sorted(&self) -> Vec<&'static str> {
        let mut entries = self.entries();
        entries.sort_unstable();
        entries
    }
}

pub(crate) struct Probe {
    label: &'static str,
    journal: Journal,
    behavior: Behavior,
    attached: AtomicUsize,
    detached: AtomicUsize,
}

impl Probe {
    pub(crate) fn new(label: &'static str, journal: &Journal) -> Arc<Self> {
        Self::with(label, journal, Behavior::Record)
    }

    pub(crate) fn with(label: &'static str, journal: &Journal, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            label,
            journal: journal.clone(),
            behavior,
            attached: AtomicUsize::new(0),
            detached: AtomicUsize::new(0),
        })
    }

    pub(crate) fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub(crate) fn detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl Listener for Probe {
    fn on_attach(&self, _category: &Category) -> Result<(), ListenerError> {
        self.attached.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::FailAttach => Err(ListenerError::failed("attach refused")),
            _ => Ok(()),
        }
    }

    fn on_detach(&self, _category: &Category) -> Result<(), ListenerError> {
        self.detached.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::PanicDetach {
            panic!("detach exploded");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

impl Ping for Probe {
    fn ping(&self, ev: &Event) -> Result<(), ListenerError> {
        if let Behavior::Sleep(pause) = self.behavior {
            std::thread::sleep(pause);
        }
        self.journal.push(self.label);
        match self.behavior {
            Behavior::Fail(msg) => Err(ListenerError::failed(msg)),
            Behavior::Panic(msg) => panic!("{msg}"),
            Behavior::Abort => Err(ListenerError::abort(self.label)),
            Behavior::Handle => {
                ev.set_handled();
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Delivery calling [`Ping::ping`].
pub(crate) fn ping() -> Delivery<dyn Ping> {
    delivery::<dyn Ping, _>(|l, ev| l.ping(ev))
}

/// Router recording `"listener: message"` lines and swallowing the failure.
pub(crate) fn capture() -> (RouterRef<dyn Ping>, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let r = router(move |ctx: &ExceptionContext<'_, dyn Ping>| {
        sink.lock()
            .unwrap()
            .push(format!("{}: {}", ctx.listener_name(), ctx.error.as_message()));
        Ok(())
    });
    (r, seen)
}

/// Multi-thread runtime for worker-backed dispatchers.
pub(crate) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// Polls `cond` for up to two seconds.
pub(crate) fn eventually(cond: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
