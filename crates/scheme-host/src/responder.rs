//! The four-step responder protocol and the synchronous responder.
//!
//! # Protocol
//!
//! ```text
//! host: begin(request)      → Ok(true)  accepted, content resolved
//!                           → Ok(false) not ours, try another responder
//! host: metadata()          → mime, status, length (published once)
//! host: read(buf, cont) ... → Data(n) | Pending | Complete
//! host: cancel()            → at any time, idempotent
//! ```
//!
//! `Pending` is only produced by the deferred responder. After it the host
//! must not read again until the continuation it passed in is invoked.

use std::fmt;
use std::sync::Arc;

use scheme_core::Request;

use crate::content::{ContentMap, Route};
use crate::continuation::Continuation;
use crate::error::{ResponderError, ResponderResult};
use crate::source::ByteSource;
use crate::state::{self, Phase, ReadGate, ResponderState, SharedState};

/// Response metadata handed to the host before any byte is transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub mime_type: String,
    pub status: u16,
    /// Total content length in bytes.
    pub length: u64,
}

impl ResponseMetadata {
    pub fn ok(mime_type: impl Into<String>, length: u64) -> Self {
        Self {
            mime_type: mime_type.into(),
            status: 200,
            length,
        }
    }
}

/// Outcome of a single read step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n > 0` bytes were written to the front of the caller's buffer.
    Data(usize),
    /// No bytes now, more later. Wait for the continuation.
    Pending,
    /// End of stream.
    Complete,
}

impl ReadOutcome {
    /// Bytes delivered by this step (zero for `Pending` and `Complete`).
    pub fn bytes(self) -> usize {
        match self {
            ReadOutcome::Data(n) => n,
            ReadOutcome::Pending | ReadOutcome::Complete => 0,
        }
    }
}

/// A per-request responder driven by the host.
///
/// Steps are issued sequentially from one host thread; implementations may
/// rely on that and only guard state a resume trigger can reach.
pub trait ResourceResponder: Send + fmt::Debug {
    /// Inspect the request and resolve its content.
    fn begin(&mut self, request: &Request) -> ResponderResult<bool>;

    /// Mime type, status and length. Only valid after `begin` accepted.
    fn metadata(&mut self) -> ResponderResult<ResponseMetadata>;

    /// Copy up to `buf.len()` bytes into `buf`.
    ///
    /// `continuation` is kept only when the outcome is
    /// [`ReadOutcome::Pending`]; otherwise it is dropped uninvoked.
    fn read(&mut self, buf: &mut [u8], continuation: Continuation) -> ResponderResult<ReadOutcome>;

    /// Release the content and stop delivering bytes.
    fn cancel(&mut self);

    /// Current phase of the request.
    fn phase(&self) -> Phase;
}

/// State and content shared by both responder kinds.
///
/// Owns the [`ByteSource`] outright; only the phase machine sits behind the
/// per-instance lock. Every terminal transition drops the source.
pub(crate) struct ResponderCore {
    pub(crate) id: u64,
    pub(crate) state: SharedState,
    source: Option<ByteSource>,
    mime_type: String,
}

impl ResponderCore {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: ResponderState::shared(),
            source: None,
            mime_type: String::new(),
        }
    }

    pub(crate) fn accept(&mut self, source: ByteSource, mime_type: impl Into<String>) {
        self.mime_type = mime_type.into();
        self.source = Some(source);
    }

    pub(crate) fn phase(&self) -> Phase {
        state::lock(&self.state).phase()
    }

    pub(crate) fn metadata(&mut self) -> ResponderResult<ResponseMetadata> {
        let mut state = state::lock(&self.state);
        if let Some(published) = state.metadata() {
            return Ok(published.clone());
        }
        let source = self.source.as_ref().ok_or(ResponderError::ProtocolViolation(
            "metadata requested before begin accepted the request",
        ))?;
        let metadata = state.publish(ResponseMetadata::ok(self.mime_type.clone(), source.len()))?;
        tracing::debug!(
            responder = self.id,
            mime_type = %metadata.mime_type,
            length = metadata.length,
            "published response metadata"
        );
        Ok(metadata)
    }

    /// Admit a read step, failing the request on protocol violations.
    pub(crate) fn enter_read(&mut self, buf: &[u8]) -> ResponderResult<ReadGate> {
        let mut state = state::lock(&self.state);
        let gate = if buf.is_empty() {
            Err(ResponderError::ProtocolViolation("read issued with an empty buffer"))
        } else {
            state.enter_read()
        };
        if let Err(ResponderError::ProtocolViolation(reason)) = &gate {
            tracing::warn!(
                responder = self.id,
                phase = %state.phase(),
                reason,
                "protocol violation, failing request"
            );
            state.fail();
            self.source = None;
        }
        gate
    }

    /// Deliver the next chunk from the source.
    pub(crate) fn read_ready(&mut self, buf: &mut [u8]) -> ResponderResult<ReadOutcome> {
        let chunk = match self.source.as_mut() {
            Some(source) => source.read_chunk(buf),
            None => return Err(ResponderError::Cancelled),
        };
        let mut state = state::lock(&self.state);
        match chunk {
            Ok(chunk) if chunk.bytes > 0 => {
                state.mark_reading();
                tracing::debug!(
                    responder = self.id,
                    bytes = chunk.bytes,
                    exhausted = chunk.exhausted,
                    "delivered chunk"
                );
                Ok(ReadOutcome::Data(chunk.bytes))
            }
            Ok(_) => {
                state.complete();
                self.source = None;
                tracing::debug!(responder = self.id, "response complete");
                Ok(ReadOutcome::Complete)
            }
            Err(e) => {
                tracing::warn!(responder = self.id, error = %e, "byte source failed mid-read");
                state.fail();
                self.source = None;
                Err(e.into())
            }
        }
    }

    pub(crate) fn cancel(&mut self) {
        let cancelled = state::lock(&self.state).cancel();
        self.source = None;
        if cancelled {
            tracing::debug!(responder = self.id, "request cancelled");
        }
    }
}

impl fmt::Debug for ResponderCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponderCore")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("source", &self.source)
            .finish()
    }
}

/// Serves fully buffered content with no artificial delay: the request-dump
/// page, bundled assets and static bytes. Never pauses.
#[derive(Debug)]
pub struct StreamingResponder {
    core: ResponderCore,
    content: Arc<ContentMap>,
}

impl StreamingResponder {
    pub fn new(id: u64, content: Arc<ContentMap>) -> Self {
        Self {
            core: ResponderCore::new(id),
            content,
        }
    }

    pub fn id(&self) -> u64 {
        self.core.id
    }
}

impl ResourceResponder for StreamingResponder {
    fn begin(&mut self, request: &Request) -> ResponderResult<bool> {
        let url = request.url();
        let (source, mime_type) = match self.content.route(url) {
            Some(Route::Diagnostic) => {
                let page = crate::content::diagnostic_page(request);
                (ByteSource::from_bytes(page), "text/html")
            }
            Some(Route::Asset { path, mime_type }) => {
                let data = std::fs::read(path).map_err(|e| {
                    tracing::warn!(responder = self.core.id, url, path = %path.display(), error = %e, "asset unavailable");
                    ResponderError::unavailable(url, e)
                })?;
                (ByteSource::from_bytes(data), mime_type.as_str())
            }
            Some(Route::Static { data, mime_type }) => {
                (ByteSource::from_bytes(data.clone()), mime_type.as_str())
            }
            Some(Route::Deferred { .. }) | None => {
                tracing::debug!(responder = self.core.id, url, "no buffered content for target, declined");
                return Ok(false);
            }
        };

        tracing::debug!(
            responder = self.core.id,
            url,
            method = request.method(),
            mime_type,
            length = source.len(),
            "accepted request"
        );
        self.core.accept(source, mime_type);
        Ok(true)
    }

    fn metadata(&mut self) -> ResponderResult<ResponseMetadata> {
        self.core.metadata()
    }

    fn read(&mut self, buf: &mut [u8], _continuation: Continuation) -> ResponderResult<ReadOutcome> {
        match self.core.enter_read(buf)? {
            ReadGate::Finished => Ok(ReadOutcome::Complete),
            ReadGate::Proceed { .. } => self.core.read_ready(buf),
        }
    }

    fn cancel(&mut self) {
        self.core.cancel();
    }

    fn phase(&self) -> Phase {
        self.core.phase()
    }
}
