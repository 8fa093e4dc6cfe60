//! # Failure diagnostics.
//!
//! Helpers shared by routers and dispatchers:
//! - [`FailureRecord`]: flat, owned description of one listener failure
//!   (listener, event, thread, error), the unit a logging sink records;
//! - [`FailureSink`]: the "record failure" boundary towards logging sinks;
//! - panic isolation at the delivery boundary (`catch_unwind` → [`ListenerError::Panicked`]).

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::ListenerError;
use crate::events::Category;
use crate::listeners::Listener;
use crate::routing::{ExceptionContext, FailurePhase};

/// Owned snapshot of one listener failure.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Listener name ([`Listener::name`]).
    pub listener: &'static str,
    /// Where the failure happened.
    pub phase: FailurePhase,
    /// Category being delivered, attached or detached.
    pub category: Category,
    /// Sequence number of the event being delivered, if any.
    pub event_seq: Option<u64>,
    /// Thread that ran the listener.
    pub thread: String,
    /// Stable error label.
    pub label: &'static str,
    /// Error message.
    pub message: String,
}

impl FailureRecord {
    /// Captures the failure described by `ctx`.
    pub fn capture<L: Listener + ?Sized>(ctx: &ExceptionContext<'_, L>) -> Self {
        Self {
            listener: ctx.listener_name(),
            phase: ctx.phase,
            category: ctx.category.clone(),
            event_seq: ctx.event.map(|e| e.seq),
            thread: ctx.thread_name(),
            label: ctx.error.as_label(),
            message: ctx.error.as_message(),
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] listener={} category={} thread={} {}: {}",
            self.phase.as_label(),
            self.listener,
            self.category,
            self.thread,
            self.label,
            self.message
        )?;
        if let Some(seq) = self.event_seq {
            write!(f, " event_seq={seq}")?;
        }
        Ok(())
    }
}

/// Destination of failure records.
pub trait FailureSink: Send + Sync + 'static {
    /// Record one failure.
    fn record(&self, record: &FailureRecord);
}

/// Sink writing records as `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn record(&self, r: &FailureRecord) {
        warn!(
            listener = r.listener,
            phase = r.phase.as_label(),
            category = %r.category,
            event_seq = r.event_seq,
            thread = %r.thread,
            label = r.label,
            error = %r.message,
            "listener failure"
        );
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a listener callback, converting a panic into [`ListenerError::Panicked`].
pub(crate) fn guarded<F>(f: F) -> Result<(), ListenerError>
where
    F: FnOnce() -> Result<(), ListenerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(payload) => Err(ListenerError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::Event;

    struct Sensor;
    impl Listener for Sensor {
        fn name(&self) -> &'static str {
            "sensor"
        }
    }

    #[test]
    fn test_guarded_converts_panic() {
        let res = guarded(|| panic!("kaboom"));
        match res {
            Err(ListenerError::Panicked { message }) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected: {other:?}"),
        }

        let formatted = guarded(|| panic!("code {}", 7));
        assert_eq!(formatted.unwrap_err().as_message(), "code 7");
    }

    #[test]
    fn test_guarded_passes_through_results() {
        assert!(guarded(|| Ok(())).is_ok());
        assert!(guarded(|| Err(ListenerError::abort("stop"))).unwrap_err().is_abort());
    }

    #[test]
    fn test_record_capture_and_display() {
        let err = ListenerError::failed("boom");
        let listener = Arc::new(Sensor);
        let event = Event::new((), "ping").into_arc();
        let ctx = ExceptionContext::delivery(&err, &listener, &event);

        let record = FailureRecord::capture(&ctx);
        assert_eq!(record.listener, "sensor");
        assert_eq!(record.message, "boom");
        assert_eq!(record.event_seq, Some(event.seq));

        let line = record.to_string();
        assert!(line.starts_with("[delivery] listener=sensor category=ping"));
        assert!(line.contains("listener_failed: boom"));
    }
}
