//! Error types used by the dispatch runtime, listeners and routers.
//!
//! This module defines three error enums:
//!
//! - [`DispatchError`] — errors returned to the caller of a registry or dispatcher operation.
//! - [`ListenerError`] — failures raised by listeners (delivery, attach/detach hooks) and routers.
//! - [`StackError`] — internal-consistency defects of the [`EventStack`](crate::EventStack).
//!
//! All of them provide `as_label` (stable snake_case) for logs/metrics.
//!
//! ## Propagation
//! ```text
//! InvalidArgument ──────────────► returned synchronously, never routed
//! ListenerError::Failed/Panicked ► routed to the ExceptionRouter, loop continues
//! router failure ───────────────► logged and discarded
//! ListenerError::Abort ─────────► DispatchError::Aborted (inline dispatch only)
//! StackError ───────────────────► fatal (FrameGuard panics)
//! ```

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error carried by [`ListenerError::Failed`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// # Errors returned by registry and dispatcher operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A required argument was missing or unusable (empty category, reused event).
    #[error("invalid argument: {what}")]
    InvalidArgument {
        /// What was wrong with the argument.
        what: &'static str,
    },

    /// A listener or router raised [`ListenerError::Abort`] during an inline dispatch.
    #[error("dispatch aborted: {reason}")]
    Aborted {
        /// Reason carried by the abort signal.
        reason: String,
    },

    /// A blocking fan-out wait was interrupted before every delivery completed.
    #[error("dispatch interrupted; {pending} deliveries still pending")]
    Interrupted {
        /// Number of deliveries that had not completed when the wait was interrupted.
        pending: usize,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::DispatchError;
    ///
    /// let err = DispatchError::InvalidArgument { what: "category" };
    /// assert_eq!(err.as_label(), "dispatch_invalid_argument");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::InvalidArgument { .. } => "dispatch_invalid_argument",
            DispatchError::Aborted { .. } => "dispatch_aborted",
            DispatchError::Interrupted { .. } => "dispatch_interrupted",
        }
    }

    /// Returns true if the dispatch was terminated by an abort signal.
    pub fn is_aborted(&self) -> bool {
        matches!(self, DispatchError::Aborted { .. })
    }

    pub(crate) fn aborted(signal: ListenerError) -> Self {
        match signal {
            ListenerError::Abort { reason } => DispatchError::Aborted { reason },
            other => DispatchError::Aborted {
                reason: other.as_message(),
            },
        }
    }
}

/// # Failures raised by listeners and exception routers.
///
/// `Failed` and `Panicked` are isolated per listener: they are routed and the
/// dispatch loop moves on. `Abort` is the one designated signal allowed to
/// terminate an inline dispatch and reach the caller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListenerError {
    /// Listener returned an error.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// Listener panicked; the panic was caught at the delivery boundary.
    #[error("panicked: {message}")]
    Panicked {
        /// Extracted panic payload.
        message: String,
    },

    /// Deliberate termination of the current dispatch call.
    #[error("abort: {reason}")]
    Abort {
        /// Why the dispatch was aborted.
        reason: String,
    },
}

impl ListenerError {
    /// Wraps any error (or message) as a listener failure.
    ///
    /// # Example
    /// ```
    /// use eventvisor::ListenerError;
    ///
    /// let err = ListenerError::failed("boom");
    /// assert_eq!(err.to_string(), "boom");
    /// assert!(!err.is_abort());
    /// ```
    pub fn failed(err: impl Into<BoxError>) -> Self {
        ListenerError::Failed(err.into())
    }

    /// Builds the abort signal.
    pub fn abort(reason: impl Into<String>) -> Self {
        ListenerError::Abort {
            reason: reason.into(),
        }
    }

    /// True for [`ListenerError::Abort`].
    pub fn is_abort(&self) -> bool {
        matches!(self, ListenerError::Abort { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Failed(_) => "listener_failed",
            ListenerError::Panicked { .. } => "listener_panicked",
            ListenerError::Abort { .. } => "listener_abort",
        }
    }

    /// Returns the bare message without the variant prefix.
    pub fn as_message(&self) -> String {
        match self {
            ListenerError::Failed(err) => err.to_string(),
            ListenerError::Panicked { message } => message.clone(),
            ListenerError::Abort { reason } => reason.clone(),
        }
    }
}

/// # Event stack consistency errors.
///
/// Unbalanced push/pop is a defect in the dispatcher, not a runtime condition.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// The frame being popped is not the innermost frame of its thread.
    #[error("event stack invariant violated: {detail}")]
    InvariantViolation {
        /// Human-readable description of the mismatch.
        detail: String,
    },
}

impl StackError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StackError::InvariantViolation { .. } => "stack_invariant_violation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_converts_to_aborted() {
        let err = DispatchError::aborted(ListenerError::abort("stop"));
        assert!(err.is_aborted());
        assert_eq!(err.to_string(), "dispatch aborted: stop");
    }

    #[test]
    fn test_failed_message_has_no_prefix() {
        let err = ListenerError::failed("boom");
        assert_eq!(err.as_message(), "boom");
        assert_eq!(err.as_label(), "listener_failed");
    }

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(
            DispatchError::Interrupted { pending: 2 }.as_label(),
            "dispatch_interrupted"
        );
        assert_eq!(
            ListenerError::Panicked {
                message: "x".into()
            }
            .as_label(),
            "listener_panicked"
        );
        assert_eq!(
            StackError::InvariantViolation {
                detail: String::new()
            }
            .as_label(),
            "stack_invariant_violation"
        );
    }
}
