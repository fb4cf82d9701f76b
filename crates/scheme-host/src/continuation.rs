//! One-shot continuation handles.
//!
//! The host passes a [`Continuation`] with every `read`. A responder that
//! cannot produce bytes yet keeps it; whoever later resumes the responder
//! takes it back out and calls [`invoke`](Continuation::invoke), which hands
//! control back to the host so it can issue the next `read` on its own thread.
//!
//! `invoke` consumes the handle, so firing twice is unrepresentable. Dropping
//! an uninvoked handle (cancellation, completion) is silent.

use std::fmt;
use std::task::Waker;

type Resume = Box<dyn FnOnce() + Send + 'static>;

pub struct Continuation {
    resume: Resume,
}

impl Continuation {
    pub fn new(resume: impl FnOnce() + Send + 'static) -> Self {
        Self {
            resume: Box::new(resume),
        }
    }

    /// A continuation that does nothing when invoked.
    ///
    /// Useful for hosts that poll on their own schedule and for responders
    /// that never pause.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// A continuation that wakes an async task.
    pub fn from_waker(waker: Waker) -> Self {
        Self::new(move || waker.wake())
    }

    /// Fire the continuation. Fire-and-forget: the closure must not block.
    pub fn invoke(self) {
        (self.resume)();
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}
