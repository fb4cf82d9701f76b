//! Per-request responder state machine.
//!
//! ```text
//! Created → MetadataPublished → Reading ⇄ Paused → Completed
//!     └──────────────┴────────────┴─────────┴──→ Cancelled | Failed
//! ```
//!
//! `Paused` only occurs in the deferred responder. A continuation is stored
//! exactly while the phase is `Paused`; every transition out of `Paused`
//! either hands the continuation to the resumer or drops it.
//!
//! The state lives behind one mutex per responder. The host thread mutates it
//! through protocol steps; a resume trigger may reach in from another thread
//! to take the continuation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::continuation::Continuation;
use crate::error::{ResponderError, ResponderResult};
use crate::responder::ResponseMetadata;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Accepted; metadata not yet handed to the caller.
    #[default]
    Created,
    /// Mime type, status and length published. Reads are now accepted.
    MetadataPublished,
    /// A read is in progress or may be issued.
    Reading,
    /// The last read declined to produce bytes; a continuation is stored.
    Paused,
    /// Every byte has been delivered.
    Completed,
    /// Cancelled by the host.
    Cancelled,
    /// A protocol violation or I/O error ended the request.
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Created => "created",
            Phase::MetadataPublished => "metadata-published",
            Phase::Reading => "reading",
            Phase::Paused => "paused",
            Phase::Completed => "completed",
            Phase::Cancelled => "cancelled",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a read step is allowed to do, decided under the state lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadGate {
    /// Proceed; this is read call number `ordinal` (1-based).
    Proceed { ordinal: u64 },
    /// The request already completed; answer with end-of-stream.
    Finished,
}

#[derive(Debug, Default)]
pub struct ResponderState {
    phase: Phase,
    /// Number of read steps issued since `begin`. Feeds the readiness policy.
    read_calls: u64,
    metadata: Option<ResponseMetadata>,
    continuation: Option<Continuation>,
}

pub(crate) type SharedState = Arc<Mutex<ResponderState>>;

/// Lock a responder's state.
///
/// Every mutation is a handful of field writes, so a panic while the lock is
/// held cannot leave the state half-updated; poisoning is ignored.
pub(crate) fn lock(state: &Mutex<ResponderState>) -> MutexGuard<'_, ResponderState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResponderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn read_calls(&self) -> u64 {
        self.read_calls
    }

    pub fn metadata(&self) -> Option<&ResponseMetadata> {
        self.metadata.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.continuation.is_some()
    }

    /// Restart the read counter for a freshly accepted request.
    pub(crate) fn reset_reads(&mut self) {
        self.read_calls = 0;
    }

    /// Publish metadata, or return what was already published.
    ///
    /// The first call fixes the metadata for the lifetime of the request;
    /// later calls ignore `metadata` and return the stored copy.
    pub(crate) fn publish(&mut self, metadata: ResponseMetadata) -> ResponderResult<ResponseMetadata> {
        if matches!(self.phase, Phase::Cancelled | Phase::Failed) {
            return Err(ResponderError::Cancelled);
        }
        if let Some(published) = &self.metadata {
            return Ok(published.clone());
        }
        self.metadata = Some(metadata.clone());
        if self.phase == Phase::Created {
            self.phase = Phase::MetadataPublished;
        }
        Ok(metadata)
    }

    /// Admit a read step and count it.
    pub(crate) fn enter_read(&mut self) -> ResponderResult<ReadGate> {
        match self.phase {
            Phase::Created => Err(ResponderError::ProtocolViolation(
                "read issued before metadata was published",
            )),
            Phase::Paused => Err(ResponderError::ProtocolViolation(
                "read issued while paused, before the continuation fired",
            )),
            Phase::Completed => Ok(ReadGate::Finished),
            Phase::Cancelled | Phase::Failed => Err(ResponderError::Cancelled),
            Phase::MetadataPublished | Phase::Reading => {
                self.read_calls += 1;
                Ok(ReadGate::Proceed {
                    ordinal: self.read_calls,
                })
            }
        }
    }

    pub(crate) fn mark_reading(&mut self) {
        self.phase = Phase::Reading;
    }

    /// Park the request until `continuation` is taken by a resume.
    pub(crate) fn pause(&mut self, continuation: Continuation) {
        debug_assert!(matches!(
            self.phase,
            Phase::MetadataPublished | Phase::Reading
        ));
        self.phase = Phase::Paused;
        self.continuation = Some(continuation);
    }

    /// Leave `Paused` and hand the stored continuation to the caller.
    ///
    /// Returns `None` in every other phase, which makes resuming a running,
    /// finished or cancelled request a no-op.
    pub(crate) fn take_for_resume(&mut self) -> Option<Continuation> {
        if self.phase != Phase::Paused {
            return None;
        }
        self.phase = Phase::Reading;
        self.continuation.take()
    }

    pub(crate) fn complete(&mut self) {
        self.phase = Phase::Completed;
        self.continuation = None;
    }

    /// Move to `Cancelled`, dropping any stored continuation uninvoked.
    ///
    /// Returns `false` if the request was already terminal.
    pub(crate) fn cancel(&mut self) -> bool {
        self.continuation = None;
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Cancelled;
        true
    }

    pub(crate) fn fail(&mut self) {
        self.phase = Phase::Failed;
        self.continuation = None;
    }
}
