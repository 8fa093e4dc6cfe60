//! # Dispatcher configuration.
//!
//! Provides [`Config`], the settings shared by the worker-backed dispatchers.
//!
//! Config is used in two ways:
//! 1. **Shutdown**: `close()` waits up to `grace` for queued/running deliveries.
//! 2. **Fan-out mode**: `blocking_fan_out` and `interrupt` decide whether
//!    [`FanOutDispatcher`](crate::FanOutDispatcher) waits for its deliveries.
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait on close (pending work is abandoned)
//! - `interrupt = None` → a blocking fan-out wait cannot be interrupted

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Configuration for worker-backed dispatchers.
///
/// ## Field semantics
/// - `grace`: Maximum wait for pending deliveries on `close()` (`0s` = no wait)
/// - `blocking_fan_out`: Fan-out dispatch waits until every delivery completed
/// - `interrupt`: Caller-owned token that ends a blocking fan-out wait early
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time `close()` waits for the worker(s) to drain.
    ///
    /// On timeout a warning is logged and the remaining work is abandoned;
    /// `close()` itself never fails.
    pub grace: Duration,

    /// When true, fan-out `dispatch` returns only after every submitted
    /// delivery finished (or the wait was interrupted).
    pub blocking_fan_out: bool,

    /// Interrupt for blocking fan-out waits.
    ///
    /// Cancelling the token makes the waiting `dispatch` abort unfinished
    /// deliveries and return [`DispatchError::Interrupted`](crate::DispatchError::Interrupted).
    /// The token stays cancelled afterwards.
    pub interrupt: Option<CancellationToken>,
}

impl Config {
    /// Returns the close grace period as an `Option`.
    ///
    /// - `None` → do not wait
    /// - `Some(d)` → wait at most `d`
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Builder form: blocking fan-out interruptible through `token`.
    #[must_use]
    pub fn blocking(mut self, token: Option<CancellationToken>) -> Self {
        self.blocking_fan_out = true;
        self.interrupt = token;
        self
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 2000ms`
    /// - `blocking_fan_out = false` (fire and forget)
    /// - `interrupt = None`
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(2000),
            blocking_fan_out: false,
            interrupt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_sentinel() {
        let mut cfg = Config::default();
        assert_eq!(cfg.grace_period(), Some(Duration::from_millis(2000)));
        cfg.grace = Duration::ZERO;
        assert_eq!(cfg.grace_period(), None);
    }

    #[test]
    fn test_blocking_builder() {
        let token = CancellationToken::new();
        let cfg = Config::default().blocking(Some(token.clone()));
        assert!(cfg.blocking_fan_out);
        token.cancel();
        assert!(cfg.interrupt.is_some_and(|t| t.is_cancelled()));
    }
}
