//! Deferred streaming responder.
//!
//! Serves an external stream whose bytes are not always available when the
//! host asks. Each read first consults a [`ReadinessPolicy`]; a "not ready"
//! answer parks the host's continuation and returns [`ReadOutcome::Pending`]
//! immediately instead of blocking. The responder never resumes itself:
//! progress after a pause comes only from [`ResumeHandle::resume`], called by
//! an external trigger on its own thread.
//!
//! # Read flow
//!
//! ```text
//! read(buf, cont)
//!   → count the call (ordinal n)
//!   → policy.is_ready(n)?
//!     → no  → store cont, phase Paused → Pending
//!     → yes → phase Reading, read_chunk(buf)
//!              → n > 0 bytes → Data(n)
//!              → exhausted   → phase Completed → Complete
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use scheme_core::Request;

use crate::continuation::Continuation;
use crate::error::{ResponderError, ResponderResult};
use crate::readiness::{Alternating, ReadinessPolicy};
use crate::responder::{ReadOutcome, ResourceResponder, ResponderCore, ResponseMetadata};
use crate::source::ByteSource;
use crate::state::{self, Phase, ReadGate, ResponderState};

/// Mime type of every deferred response.
pub const OCTET_STREAM: &str = "application/octet-stream";

type StreamOpener = Box<dyn Fn() -> io::Result<ByteSource> + Send + Sync>;

pub struct DeferredStreamingResponder {
    core: ResponderCore,
    /// Human-readable name of the stream, for logs and errors.
    stream_name: String,
    open: StreamOpener,
    policy: Arc<dyn ReadinessPolicy>,
}

impl DeferredStreamingResponder {
    /// Serve the file at `path` under the default [`Alternating`] policy.
    pub fn new(id: u64, path: impl Into<PathBuf>) -> Self {
        Self::with_policy(id, path, Arc::new(Alternating))
    }

    pub fn with_policy(id: u64, path: impl Into<PathBuf>, policy: Arc<dyn ReadinessPolicy>) -> Self {
        let path = path.into();
        Self {
            core: ResponderCore::new(id),
            stream_name: path.display().to_string(),
            open: Box::new(move || ByteSource::open(&path)),
            policy,
        }
    }

    /// Serve whatever `open` produces. `open` runs once per `begin`.
    pub fn from_opener(
        id: u64,
        stream_name: impl Into<String>,
        open: impl Fn() -> io::Result<ByteSource> + Send + Sync + 'static,
        policy: Arc<dyn ReadinessPolicy>,
    ) -> Self {
        Self {
            core: ResponderCore::new(id),
            stream_name: stream_name.into(),
            open: Box::new(open),
            policy,
        }
    }

    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// Number of read calls issued since `begin`.
    pub fn read_calls(&self) -> u64 {
        state::lock(&self.core.state).read_calls()
    }

    /// A handle an external trigger can resume this responder through.
    ///
    /// The handle does not keep the responder alive.
    pub fn resume_handle(&self) -> ResumeHandle {
        ResumeHandle {
            id: self.core.id,
            state: Arc::downgrade(&self.core.state),
        }
    }

    /// Fire the stored continuation if paused. See [`ResumeHandle::resume`].
    pub fn resume(&self) -> bool {
        self.resume_handle().resume()
    }
}

impl ResourceResponder for DeferredStreamingResponder {
    fn begin(&mut self, request: &Request) -> ResponderResult<bool> {
        state::lock(&self.core.state).reset_reads();

        let source = (self.open)().map_err(|e| {
            tracing::warn!(
                responder = self.core.id,
                url = request.url(),
                stream = %self.stream_name,
                error = %e,
                "failed to open external stream"
            );
            state::lock(&self.core.state).fail();
            ResponderError::unavailable(&self.stream_name, e)
        })?;

        tracing::debug!(
            responder = self.core.id,
            url = request.url(),
            stream = %self.stream_name,
            length = source.len(),
            "opened external stream"
        );
        self.core.accept(source, OCTET_STREAM);
        Ok(true)
    }

    fn metadata(&mut self) -> ResponderResult<ResponseMetadata> {
        self.core.metadata()
    }

    fn read(&mut self, buf: &mut [u8], continuation: Continuation) -> ResponderResult<ReadOutcome> {
        let ordinal = match self.core.enter_read(buf)? {
            ReadGate::Finished => return Ok(ReadOutcome::Complete),
            ReadGate::Proceed { ordinal } => ordinal,
        };

        if !self.policy.is_ready(ordinal) {
            state::lock(&self.core.state).pause(continuation);
            tracing::debug!(responder = self.core.id, ordinal, "source not ready, read paused");
            return Ok(ReadOutcome::Pending);
        }

        self.core.read_ready(buf)
    }

    fn cancel(&mut self) {
        self.core.cancel();
    }

    fn phase(&self) -> Phase {
        self.core.phase()
    }
}

impl fmt::Debug for DeferredStreamingResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredStreamingResponder")
            .field("core", &self.core)
            .field("stream_name", &self.stream_name)
            .finish_non_exhaustive()
    }
}

/// Weak, clonable access to a deferred responder's pause slot.
///
/// Safe to call from any thread. Resuming a responder that was dropped,
/// finished, cancelled or simply is not paused does nothing.
#[derive(Clone, Debug)]
pub struct ResumeHandle {
    id: u64,
    state: Weak<std::sync::Mutex<ResponderState>>,
}

impl ResumeHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take the stored continuation and invoke it.
    ///
    /// The continuation runs after the state lock is released, so it may
    /// call straight back into the responder. Returns whether a continuation
    /// fired.
    pub fn resume(&self) -> bool {
        let Some(shared) = self.state.upgrade() else {
            tracing::debug!(responder = self.id, "resume ignored, responder dropped");
            return false;
        };
        let continuation = state::lock(&shared).take_for_resume();
        match continuation {
            Some(continuation) => {
                tracing::debug!(responder = self.id, "resuming paused read");
                continuation.invoke();
                true
            }
            None => {
                tracing::debug!(responder = self.id, "resume ignored, responder not paused");
                false
            }
        }
    }

    /// Whether the responder is currently parked on a continuation.
    pub fn is_paused(&self) -> bool {
        let Some(shared) = self.state.upgrade() else {
            return false;
        };
        let phase = state::lock(&shared).phase();
        phase == Phase::Paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::Immediate;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ten_bytes(policy: Arc<dyn ReadinessPolicy>) -> DeferredStreamingResponder {
        DeferredStreamingResponder::from_opener(
            1,
            "ten-bytes",
            || ByteSource::from_stream(Cursor::new(b"0123456789".to_vec())),
            policy,
        )
    }

    fn started(policy: Arc<dyn ReadinessPolicy>) -> DeferredStreamingResponder {
        let mut r = ten_bytes(policy);
        assert!(r.begin(&Request::get("client://tests/small.webm")).unwrap());
        r.metadata().unwrap();
        r
    }

    fn counter() -> (Continuation, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        let cont = Continuation::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        (cont, fired)
    }

    // ── begin / metadata ────────────────────────────────────────────

    #[test]
    fn metadata_is_octet_stream_with_stream_length() {
        let mut r = ten_bytes(Arc::new(Alternating));
        assert!(r.begin(&Request::get("client://tests/small.webm")).unwrap());
        let meta = r.metadata().unwrap();
        assert_eq!(meta, ResponseMetadata::ok(OCTET_STREAM, 10));
        assert_eq!(r.metadata().unwrap(), meta);
    }

    #[test]
    fn missing_stream_fails_begin() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = DeferredStreamingResponder::new(2, dir.path().join("absent.webm"));
        let err = r.begin(&Request::get("client://tests/small.webm")).unwrap_err();
        assert!(matches!(err, ResponderError::ContentUnavailable { .. }));
        assert_eq!(r.phase(), Phase::Failed);
        assert!(r.metadata().is_err());
    }

    #[test]
    fn file_stream_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.webm");
        std::fs::write(&path, vec![0x1A, 0x45, 0xDF, 0xA3]).unwrap();

        let mut r = DeferredStreamingResponder::with_policy(3, &path, Arc::new(Immediate));
        r.begin(&Request::get("client://tests/small.webm")).unwrap();
        assert_eq!(r.metadata().unwrap().length, 4);
        let mut buf = [0u8; 16];
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Complete);
    }

    // ── Readiness sequence ──────────────────────────────────────────

    #[test]
    fn alternating_policy_pauses_on_first_and_third_read() {
        let mut r = started(Arc::new(Alternating));
        let mut buf = [0u8; 4];
        let mut outcomes = Vec::new();
        loop {
            let outcome = r.read(&mut buf, Continuation::noop()).unwrap();
            outcomes.push(outcome);
            match outcome {
                ReadOutcome::Pending => assert!(r.resume()),
                ReadOutcome::Complete => break,
                ReadOutcome::Data(_) => {}
            }
        }
        assert_eq!(
            outcomes,
            vec![
                ReadOutcome::Pending,
                ReadOutcome::Data(4),
                ReadOutcome::Pending,
                ReadOutcome::Data(4),
                ReadOutcome::Data(2),
                ReadOutcome::Complete,
            ]
        );
        assert_eq!(r.read_calls(), 6);
        assert_eq!(r.phase(), Phase::Completed);
    }

    #[test]
    fn pending_is_not_end_of_stream() {
        let mut r = started(Arc::new(Alternating));
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Pending);
        assert_eq!(r.phase(), Phase::Paused);
        assert_ne!(r.phase(), Phase::Completed);
    }

    #[test]
    fn custom_policy_is_consulted_per_ordinal() {
        let mut r = started(Arc::new(|n: u64| n % 2 == 0));
        let mut buf = [0u8; 5];
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Pending);
        r.resume();
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Data(5));
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Pending);
        r.resume();
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Data(5));
    }

    #[test]
    fn begin_resets_the_read_counter() {
        let mut r = started(Arc::new(Immediate));
        let mut buf = [0u8; 4];
        r.read(&mut buf, Continuation::noop()).unwrap();
        assert_eq!(r.read_calls(), 1);
        r.begin(&Request::get("client://tests/small.webm")).unwrap();
        assert_eq!(r.read_calls(), 0);
    }

    // ── Continuations ───────────────────────────────────────────────

    #[test]
    fn resume_fires_stored_continuation_once() {
        let mut r = started(Arc::new(Alternating));
        let (cont, fired) = counter();
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf, cont).unwrap(), ReadOutcome::Pending);
        assert!(r.resume_handle().is_paused());

        assert!(r.resume());
        assert!(!r.resume());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(r.phase(), Phase::Reading);
    }

    #[test]
    fn ready_read_drops_continuation_uninvoked() {
        let mut r = started(Arc::new(Immediate));
        let (cont, fired) = counter();
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf, cont).unwrap(), ReadOutcome::Data(4));
        assert!(!r.resume());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn read_while_paused_fails_request() {
        let mut r = started(Arc::new(Alternating));
        let (cont, fired) = counter();
        let mut buf = [0u8; 4];
        r.read(&mut buf, cont).unwrap();

        let err = r.read(&mut buf, Continuation::noop()).unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(r.phase(), Phase::Failed);
        assert!(!r.resume());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn read_before_metadata_fails_request() {
        let mut r = ten_bytes(Arc::new(Alternating));
        r.begin(&Request::get("client://tests/small.webm")).unwrap();
        let mut buf = [0u8; 4];
        assert!(r.read(&mut buf, Continuation::noop()).unwrap_err().is_protocol_violation());
        assert_eq!(r.read_calls(), 0);
    }

    #[test]
    fn continuation_may_reenter_on_resume() {
        // The continuation runs after the state lock is released.
        let r = Arc::new(std::sync::Mutex::new(started(Arc::new(Alternating))));
        let handle = r.lock().unwrap().resume_handle();
        let observed = Arc::new(std::sync::Mutex::new(None));

        let reentrant = {
            let observed = Arc::clone(&observed);
            let handle = handle.clone();
            Continuation::new(move || {
                *observed.lock().unwrap() = Some(handle.is_paused());
            })
        };
        let mut buf = [0u8; 4];
        r.lock().unwrap().read(&mut buf, reentrant).unwrap();

        assert!(handle.resume());
        assert_eq!(*observed.lock().unwrap(), Some(false));
    }

    // ── Cancellation ────────────────────────────────────────────────

    #[test]
    fn cancel_while_paused_drops_continuation() {
        let mut r = started(Arc::new(Alternating));
        let (cont, fired) = counter();
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf, cont).unwrap(), ReadOutcome::Pending);

        r.cancel();
        assert_eq!(r.phase(), Phase::Cancelled);
        assert!(!r.resume());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(matches!(
            r.read(&mut buf, Continuation::noop()),
            Err(ResponderError::Cancelled)
        ));
    }

    #[test]
    fn handle_outlives_responder_inertly() {
        let mut r = started(Arc::new(Alternating));
        let (cont, fired) = counter();
        let mut buf = [0u8; 4];
        r.read(&mut buf, cont).unwrap();
        let handle = r.resume_handle();

        drop(r);
        assert!(!handle.is_paused());
        assert!(!handle.resume());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resume_from_another_thread() {
        let mut r = started(Arc::new(Alternating));
        let (cont, fired) = counter();
        let mut buf = [0u8; 4];
        r.read(&mut buf, cont).unwrap();

        let handle = r.resume_handle();
        let resumed = std::thread::spawn(move || handle.resume()).join().unwrap();
        assert!(resumed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(r.read(&mut buf, Continuation::noop()).unwrap(), ReadOutcome::Data(4));
    }
}
