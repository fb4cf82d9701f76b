//! Error types for responder protocol steps.

use thiserror::Error;

/// Result type alias for responder operations.
pub type ResponderResult<T> = Result<T, ResponderError>;

/// Errors a protocol step can fail a request with.
///
/// Declining a request is not an error: `begin` returns `Ok(false)` for
/// targets a responder does not serve.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The content behind a matched target could not be resolved. No
    /// metadata is published for the request.
    #[error("content unavailable for {target}: {source}")]
    ContentUnavailable {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// A step was issued out of order. Fatal to the request only.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The request was cancelled or already failed; nothing more is delivered.
    #[error("request cancelled")]
    Cancelled,

    /// The byte source failed mid-transfer.
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResponderError {
    pub(crate) fn unavailable(target: &str, source: std::io::Error) -> Self {
        Self::ContentUnavailable {
            target: target.to_string(),
            source,
        }
    }

    /// Whether this error was caused by the caller issuing steps out of order.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }
}
