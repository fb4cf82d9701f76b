//! Readiness policies for the deferred responder.
//!
//! A policy sees only the 1-based ordinal of the read call and answers
//! whether bytes are available now. It must be deterministic so that a
//! caller can predict exactly which reads will pause.

use scheme_core::config::Readiness;

pub trait ReadinessPolicy: Send + Sync {
    /// Whether read call number `ordinal` (starting at 1) may deliver bytes.
    fn is_ready(&self, ordinal: u64) -> bool;
}

impl<F> ReadinessPolicy for F
where
    F: Fn(u64) -> bool + Send + Sync,
{
    fn is_ready(&self, ordinal: u64) -> bool {
        self(ordinal)
    }
}

/// Pause on the first and third read; deliver on the second and on every
/// read from the fourth onward.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alternating;

impl Alternating {
    const NOT_READY: [u64; 2] = [1, 3];
}

impl ReadinessPolicy for Alternating {
    fn is_ready(&self, ordinal: u64) -> bool {
        !Self::NOT_READY.contains(&ordinal)
    }
}

/// Never pause.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl ReadinessPolicy for Immediate {
    fn is_ready(&self, _ordinal: u64) -> bool {
        true
    }
}

/// Build the policy selected in `scheme.toml`.
pub fn from_config(readiness: Readiness) -> std::sync::Arc<dyn ReadinessPolicy> {
    match readiness {
        Readiness::Alternating => std::sync::Arc::new(Alternating),
        Readiness::Immediate => std::sync::Arc::new(Immediate),
    }
}
