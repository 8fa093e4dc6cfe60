//! # Example: ping
//!
//! Demonstrates one registry driven by each dispatch strategy.
//!
//! Shows how to:
//! - Define a listener capability ([`Pinger`]) on top of [`Listener`].
//! - Register listeners per [`Category`] and dispatch with a [`delivery`] function.
//! - Observe failure isolation ([`LogRouter`] output) and cascade prevention.
//! - Run the same listeners on a background worker and fanned out.
//!
//! ## Flow
//! ```text
//! InlineDispatcher   ──► ping: [loud, flaky, quiet]     (flaky fails; loud + quiet still run)
//!                    ──► ping preventing "pong": loud dispatches "pong" ─► Prevented
//! WorkerDispatcher   ──► 3 × ping queued ─► delivered on the worker ─► close()
//! FanOutDispatcher   ──► ping (blocking) ─► every listener on its own task
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=eventvisor=trace cargo run --example ping
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use eventvisor::{
    Category, Config, Delivery, DispatchOutcome, Dispatcher, Event, FanOutDispatcher,
    InlineDispatcher, Listener, ListenerError, ListenerRegistry, LogRouter, SequentialRegistry,
    WorkerDispatcher, delivery,
};
use tracing_subscriber::EnvFilter;

/// Capability implemented by the demo listeners.
trait Pinger: Listener {
    fn ping(&self, ev: &Event) -> Result<(), ListenerError>;
}

struct Loud {
    seen: AtomicUsize,
}

impl Listener for Loud {
    fn name(&self) -> &'static str {
        "loud"
    }
}

impl Pinger for Loud {
    fn ping(&self, ev: &Event) -> Result<(), ListenerError> {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "[loud]  event #{} on {:?} (seen {n})",
            ev.seq,
            std::thread::current().name().unwrap_or("unnamed")
        );
        Ok(())
    }
}

struct Flaky;

impl Listener for Flaky {
    fn name(&self) -> &'static str {
        "flaky"
    }
}

impl Pinger for Flaky {
    fn ping(&self, ev: &Event) -> Result<(), ListenerError> {
        if ev.seq % 2 == 0 {
            return Err(ListenerError::failed("flaky on even events"));
        }
        println!("[flaky] event #{}", ev.seq);
        Ok(())
    }
}

struct Quiet;

impl Listener for Quiet {}

impl Pinger for Quiet {
    fn ping(&self, _ev: &Event) -> Result<(), ListenerError> {
        std::thread::sleep(Duration::from_millis(10));
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eventvisor=warn")),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("ping-rt")
        .enable_all()
        .build()?;

    let ping = Category::new("ping");
    let pong = Category::new("pong");
    let ping_all: Delivery<dyn Pinger> = delivery::<dyn Pinger, _>(|l, ev| l.ping(ev));

    let wire = || -> Result<Arc<SequentialRegistry<dyn Pinger>>, eventvisor::DispatchError> {
        let registry: Arc<SequentialRegistry<dyn Pinger>> = Arc::new(SequentialRegistry::new());
        registry.register(&ping, Arc::new(Loud { seen: AtomicUsize::new(0) }))?;
        registry.register(&ping, Arc::new(Flaky))?;
        registry.register(&ping, Arc::new(Quiet))?;
        registry.register(&pong, Arc::new(Loud { seen: AtomicUsize::new(0) }))?;
        Ok(registry)
    };

    // Inline: caller thread, registration order, failures logged.
    let inline = Arc::new(InlineDispatcher::new(wire()?));
    inline.set_default_router(Some(Arc::new(LogRouter::new())));
    for _ in 0..2 {
        let outcome = inline.dispatch(Event::new("demo", "ping").into_arc(), Arc::clone(&ping_all))?;
        println!("inline  -> {outcome:?}");
    }

    // Cascade: while a "ping" preventing "pong" is dispatched, nested "pong" dispatches are suppressed.
    let nested = Arc::clone(&inline);
    let cascading = delivery::<dyn Pinger, _>(move |l, ev| {
        let child = Event::new("cascade", "pong")
            .caused_by_top_of(nested.event_stack())
            .into_arc();
        let outcome = nested
            .dispatch(child, delivery::<dyn Pinger, _>(|l, ev| l.ping(ev)))
            .map_err(ListenerError::failed)?;
        if outcome != DispatchOutcome::Prevented {
            println!("[{}]  pong was not prevented: {outcome:?}", l.name());
        }
        l.ping(ev)
    });
    let root = Event::new("demo", "ping").preventing("pong").into_arc();
    inline.dispatch(Arc::clone(&root), cascading)?;
    println!("cascade -> {} pong dispatch(es) prevented", root.prevented_events().len());
    inline.close();

    // Worker: queued, one job at a time, then close().
    let worker = WorkerDispatcher::new(wire()?, runtime.handle().clone(), Config::default());
    for _ in 0..3 {
        let outcome = worker.dispatch(Event::new("demo", "ping").into_arc(), Arc::clone(&ping_all))?;
        println!("worker  -> {outcome:?}");
    }
    // Jobs snapshot when they start; close() first would leave them nobody to notify.
    std::thread::sleep(Duration::from_millis(200));
    worker.close();

    // Fan-out: one task per listener, dispatch waits for all of them.
    let fanout = FanOutDispatcher::new(
        wire()?,
        runtime.handle().clone(),
        Config::default().blocking(None),
    );
    let outcome = fanout.dispatch(Event::new("demo", "ping").into_arc(), ping_all)?;
    println!("fan-out -> {outcome:?}");
    fanout.close();

    Ok(())
}
