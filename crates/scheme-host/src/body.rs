//! Async body adapter.
//!
//! [`ResponderBody`] drives a responder's `read` steps from a task and yields
//! the delivered chunks as a [`Stream`]. A `Pending` outcome parks the
//! stream; the continuation passed with that read wakes the task once an
//! external resume fires it. Polls that arrive while parked do not issue a
//! read, so a responder never sees a read before its continuation fired.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use bytes::Bytes;
use futures_core::Stream;
use scheme_core::Request;

use crate::continuation::Continuation;
use crate::error::{ResponderError, ResponderResult};
use crate::responder::{ReadOutcome, ResourceResponder, ResponseMetadata};
use crate::state::Phase;

/// Wake-up slot shared between a parked body and its continuation.
#[derive(Default)]
struct Wakeup {
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Wakeup {
    fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        let waker = self.waker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

pub struct ResponderBody {
    responder: Box<dyn ResourceResponder>,
    buf: Vec<u8>,
    parked: Option<Arc<Wakeup>>,
    pending: u64,
    finished: bool,
}

impl ResponderBody {
    /// Run `begin` and `metadata` on `responder`.
    ///
    /// Returns `Ok(None)` when the responder declines the request. Each read
    /// asks for at most `chunk_size` bytes.
    pub fn open(
        mut responder: Box<dyn ResourceResponder>,
        request: &Request,
        chunk_size: usize,
    ) -> ResponderResult<Option<(ResponseMetadata, Self)>> {
        if chunk_size == 0 {
            return Err(ResponderError::ProtocolViolation("chunk size must be nonzero"));
        }
        if !responder.begin(request)? {
            return Ok(None);
        }
        let metadata = responder.metadata()?;
        let body = Self {
            responder,
            buf: vec![0; chunk_size],
            parked: None,
            pending: 0,
            finished: false,
        };
        Ok(Some((metadata, body)))
    }

    /// Number of reads that answered `Pending` so far.
    pub fn pending_count(&self) -> u64 {
        self.pending
    }

    pub fn phase(&self) -> Phase {
        self.responder.phase()
    }
}

impl Stream for ResponderBody {
    type Item = ResponderResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Some(wakeup) = &this.parked {
            if !wakeup.has_fired() {
                wakeup.register(cx.waker());
                // The continuation may have fired between the check and the
                // registration.
                if !wakeup.has_fired() {
                    return Poll::Pending;
                }
            }
            this.parked = None;
        }

        let wakeup = Arc::new(Wakeup::default());
        wakeup.register(cx.waker());
        let continuation = {
            let wakeup = Arc::clone(&wakeup);
            Continuation::new(move || wakeup.fire())
        };

        match this.responder.read(&mut this.buf, continuation) {
            Ok(ReadOutcome::Data(n)) => Poll::Ready(Some(Ok(Bytes::copy_from_slice(&this.buf[..n])))),
            Ok(ReadOutcome::Pending) => {
                this.pending += 1;
                this.parked = Some(wakeup);
                Poll::Pending
            }
            Ok(ReadOutcome::Complete) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Err(e) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}

impl Drop for ResponderBody {
    fn drop(&mut self) {
        self.responder.cancel();
    }
}

impl fmt::Debug for ResponderBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponderBody")
            .field("responder", &self.responder)
            .field("chunk_size", &self.buf.len())
            .field("parked", &self.parked.is_some())
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .finish()
    }
}
