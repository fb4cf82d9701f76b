//! scheme-host: responders for an application-defined URL scheme.
//!
//! A host (browser shell, webview, embedded renderer) intercepts requests for
//! its custom scheme and pulls the response out of a responder one chunk at a
//! time:
//! - **responder**: the four-step protocol (`begin`, `metadata`, `read`, `cancel`)
//!   and the synchronous [`StreamingResponder`]
//! - **deferred**: [`DeferredStreamingResponder`], which may answer a read with
//!   "not ready yet" and finish it after an external resume
//! - **state**: the per-request phase machine shared by both responders
//! - **source**: [`ByteSource`], sequential content of known length
//! - **continuation**: the one-shot handle a paused read is resumed through
//! - **registry**: scheme registration, the responder factory and the
//!   most-recent resume slot
//! - **content**: target → content routing and the request-dump page
//! - **body**: async [`futures_core::Stream`] adapter for hosts running on tokio
//! - **trigger**: timer-driven external resume task
//! - **config**: [`HostConfig`] built from `scheme.toml`
//!
//! # Threading
//!
//! All protocol steps for one responder are issued sequentially from one host
//! thread. Only `resume` may arrive from elsewhere; it touches the per-instance
//! state behind a mutex and never performs reads itself.

pub mod body;
pub mod config;
pub mod content;
pub mod continuation;
pub mod deferred;
mod error;
pub mod readiness;
pub mod registry;
pub mod responder;
pub mod source;
pub mod state;
pub mod trigger;

pub use body::ResponderBody;
pub use config::HostConfig;
pub use continuation::Continuation;
pub use deferred::{DeferredStreamingResponder, ResumeHandle};
pub use error::{ResponderError, ResponderResult};
pub use readiness::{Alternating, Immediate, ReadinessPolicy};
pub use registry::{BrowserContext, FrameContext, ResponderRegistry, SchemeHandlerFactory, SchemeRegistration};
pub use responder::{ReadOutcome, ResourceResponder, ResponseMetadata, StreamingResponder};
pub use source::ByteSource;
pub use state::Phase;
pub use trigger::ResumeTrigger;
