//! # Event stack: active dispatch frames and cascade tracking.
//!
//! Every dispatcher owns one [`EventStack`]. A [`DispatchFrame`] is pushed when a
//! dispatch call starts delivering and popped when it finishes. Nested dispatch
//! calls made from inside a listener push on top of it, which lets the
//! dispatcher detect and suppress cascades.
//!
//! ## Architecture
//! ```text
//! dispatch(E1: "order")
//!   └─► push [E1] ──► listener ──► dispatch(E2: "audit")
//!                                     ├─► prevent_dispatch("audit")
//!                                     │     scans [E1] innermost → outermost
//!                                     │     E1 suppresses "audit"? ──► E2.prevented = true,
//!                                     │                                E1 records E2, return
//!                                     └─► otherwise push [E1, E2] ... pop E2
//!   └─► pop E1 (FrameGuard drop, also on unwinding)
//! ```
//!
//! ## Rules
//! - The stack mutex is held only for a single push/pop/scan, never while listeners run.
//! - `pop` must remove the innermost frame of the frame's thread. Frames pushed
//!   by other threads (concurrent calls on the same dispatcher) may sit above it.
//! - A mismatch is a [`StackError::InvariantViolation`] and is fatal in [`FrameGuard`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::error;

use crate::error::StackError;
use crate::events::{Category, Event};

/// One active dispatch call.
#[derive(Debug)]
pub struct DispatchFrame {
    event: Arc<Event>,
    category: Category,
    thread: ThreadId,
}

impl DispatchFrame {
    /// Creates a frame for `event` owned by the current thread.
    pub fn new(event: Arc<Event>) -> Self {
        Self {
            category: event.category().clone(),
            event,
            thread: thread::current().id(),
        }
    }

    /// Event being dispatched.
    #[inline]
    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    /// Category being dispatched.
    #[inline]
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Thread that pushed the frame.
    #[inline]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// True if dispatches of `category` are suppressed while this frame is active.
    #[inline]
    pub fn suppresses(&self, category: &Category) -> bool {
        self.event.suppresses(category)
    }

    /// Records an event suppressed because of this frame.
    #[inline]
    pub fn record_prevented(&self, event: Arc<Event>) {
        self.event.record_prevented(event);
    }
}

/// Lock-protected stack of [`DispatchFrame`]s.
#[derive(Debug, Default)]
pub struct EventStack {
    frames: Mutex<Vec<Arc<DispatchFrame>>>,
}

impl EventStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    fn frames(&self) -> MutexGuard<'_, Vec<Arc<DispatchFrame>>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes `frame` and returns a guard that pops it when dropped.
    pub fn push(&self, frame: Arc<DispatchFrame>) -> FrameGuard<'_> {
        self.frames().push(Arc::clone(&frame));
        FrameGuard { stack: self, frame }
    }

    /// Removes `expected` from the stack.
    ///
    /// ### Errors
    /// [`StackError::InvariantViolation`] if the frame is not on the stack, or
    /// if a frame of the same thread sits above it.
    pub fn pop(&self, expected: &Arc<DispatchFrame>) -> Result<(), StackError> {
        let mut frames = self.frames();
        let Some(pos) = frames.iter().rposition(|f| Arc::ptr_eq(f, expected)) else {
            return Err(StackError::InvariantViolation {
                detail: format!(
                    "frame for event seq={} ({}) is not on the stack",
                    expected.event.seq, expected.category
                ),
            });
        };
        if let Some(above) = frames[pos + 1..]
            .iter()
            .find(|f| f.thread == expected.thread)
        {
            return Err(StackError::InvariantViolation {
                detail: format!(
                    "popping event seq={} while nested event seq={} is still active",
                    expected.event.seq, above.event.seq
                ),
            });
        }
        frames.remove(pos);
        Ok(())
    }

    /// Innermost frame, if any.
    pub fn peek(&self) -> Option<Arc<DispatchFrame>> {
        self.frames().last().cloned()
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames().len()
    }

    /// True if no dispatch is active.
    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    /// True if any active frame targets `category`.
    pub fn is_active(&self, category: &Category) -> bool {
        self.frames().iter().any(|f| &f.category == category)
    }

    /// True if any active frame targets one of `categories`.
    pub fn is_any_active(&self, categories: &[Category]) -> bool {
        self.frames()
            .iter()
            .any(|f| categories.contains(&f.category))
    }

    /// Innermost frame whose event suppresses `category`, if any.
    pub fn prevent_dispatch(&self, category: &Category) -> Option<Arc<DispatchFrame>> {
        self.frames()
            .iter()
            .rev()
            .find(|f| f.suppresses(category))
            .cloned()
    }
}

/// Scoped ownership of a pushed frame; pops it on drop.
///
/// A failed pop means push/pop became unbalanced. It is logged and, unless
/// the thread is already unwinding, turned into a panic.
#[must_use = "dropping the guard pops the frame immediately"]
pub struct FrameGuard<'a> {
    stack: &'a EventStack,
    frame: Arc<DispatchFrame>,
}

impl FrameGuard<'_> {
    /// The guarded frame.
    pub fn frame(&self) -> &Arc<DispatchFrame> {
        &self.frame
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.stack.pop(&self.frame) {
            error!(label = err.as_label(), error = %err, "event stack corrupted");
            if !thread::panicking() {
                panic!("{err}");
            }
        }
    }
}
