//! # LogRouter — default exception router
//!
//! Used whenever no router is configured. It records the listener, event,
//! thread and error of each failure to a [`FailureSink`] and lets the dispatch
//! loop continue with the next listener.
//!
//! ## Example output (with [`TracingSink`])
//! ```text
//! WARN listener failure listener="app::Mailer" phase="delivery" category=order event_seq=12 thread=main label="listener_failed" error=smtp down
//! WARN listener failure listener="app::Cache" phase="attach" category=order thread=main label="listener_panicked" error=not ready
//! ```

use std::sync::Arc;

use crate::error::ListenerError;
use crate::listeners::Listener;
use crate::routing::{ExceptionContext, ExceptionRouter, FailureRecord, FailureSink, RouterRef, TracingSink};

/// Logging router: records and swallows.
#[derive(Clone)]
pub struct LogRouter {
    sink: Arc<dyn FailureSink>,
}

impl LogRouter {
    /// Router writing to [`TracingSink`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: Arc::new(TracingSink),
        }
    }

    /// Router writing to a custom sink.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn FailureSink>) -> Self {
        Self { sink }
    }
}

impl Default for LogRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Listener + ?Sized> ExceptionRouter<L> for LogRouter {
    fn route(&self, ctx: &ExceptionContext<'_, L>) -> Result<(), ListenerError> {
        self.sink.record(&FailureRecord::capture(ctx));
        Ok(())
    }
}

/// Fresh default router handle.
pub fn default_router<L: Listener + ?Sized>() -> RouterRef<L> {
    Arc::new(LogRouter::new())
}
