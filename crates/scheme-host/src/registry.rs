//! Scheme registration and the responder factory.
//!
//! The host registers one scheme at startup, then calls
//! [`SchemeHandlerFactory::create`] once per request. Every request gets a
//! fresh responder; none are reused.
//!
//! The registry also keeps a single "most recent" slot pointing at the last
//! deferred responder it created. An external trigger resumes that one
//! responder through [`ResponderRegistry::resume_most_recent`]. The slot
//! holds a weak handle: it never keeps a responder alive, and a newer
//! deferred request overwrites it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use scheme_core::config::SchemeSection;
use scheme_core::Request;

use crate::config::HostConfig;
use crate::content::{ContentMap, Route};
use crate::deferred::{DeferredStreamingResponder, ResumeHandle};
use crate::readiness::{self, ReadinessPolicy};
use crate::responder::{ResourceResponder, StreamingResponder};

/// Registration data handed to the host for the custom scheme.
///
/// The flags are opaque here: they are passed through to the host's scheme
/// registrar and have no effect on responder behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRegistration {
    pub name: String,
    pub domain: String,
    pub standard: bool,
    pub local: bool,
    pub display_isolated: bool,
}

impl SchemeRegistration {
    pub fn from_section(section: &SchemeSection) -> Self {
        Self {
            name: section.name.clone(),
            domain: section.domain.clone(),
            standard: section.standard,
            local: section.local,
            display_isolated: section.display_isolated,
        }
    }

    /// `name://domain/`, the prefix every served URL starts with.
    pub fn origin(&self) -> String {
        format!("{}://{}/", self.name, self.domain)
    }
}

impl Default for SchemeRegistration {
    fn default() -> Self {
        Self::from_section(&SchemeSection::default())
    }
}

/// Opaque identifier of the browser a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrowserContext {
    pub id: u64,
}

/// Opaque identifier of the frame a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameContext {
    pub id: u64,
    pub is_main: bool,
}

/// Produces one responder per request.
pub trait SchemeHandlerFactory: Send + Sync {
    /// A fresh responder for `request`, or `None` if `scheme_name` is not
    /// handled here.
    fn create(
        &self,
        browser: Option<&BrowserContext>,
        frame: Option<&FrameContext>,
        scheme_name: &str,
        request: &Request,
    ) -> Option<Box<dyn ResourceResponder>>;
}

pub struct ResponderRegistry {
    registration: SchemeRegistration,
    content: Arc<ContentMap>,
    policy: Arc<dyn ReadinessPolicy>,
    next_id: AtomicU64,
    most_recent: Mutex<Option<ResumeHandle>>,
}

impl ResponderRegistry {
    pub fn new(
        registration: SchemeRegistration,
        content: ContentMap,
        policy: Arc<dyn ReadinessPolicy>,
    ) -> Self {
        Self {
            registration,
            content: Arc::new(content),
            policy,
            next_id: AtomicU64::new(1),
            most_recent: Mutex::new(None),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(
            config.registration.clone(),
            config.content.clone(),
            readiness::from_config(config.readiness),
        )
    }

    pub fn registration(&self) -> &SchemeRegistration {
        &self.registration
    }

    pub fn content(&self) -> &ContentMap {
        &self.content
    }

    /// Create a responder for `request`, taking the scheme from its URL.
    pub fn create_for(&self, request: &Request) -> Option<Box<dyn ResourceResponder>> {
        let scheme = request.scheme()?;
        self.create(None, None, scheme, request)
    }

    /// Resume the most recently created deferred responder.
    ///
    /// Does nothing if no deferred responder was created yet, if it was
    /// dropped, or if it is not currently paused. Returns whether a
    /// continuation fired.
    pub fn resume_most_recent(&self) -> bool {
        let handle = self
            .most_recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        handle.is_some_and(|handle| handle.resume())
    }

    fn track(&self, handle: ResumeHandle) {
        *self.most_recent.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

impl SchemeHandlerFactory for ResponderRegistry {
    fn create(
        &self,
        browser: Option<&BrowserContext>,
        frame: Option<&FrameContext>,
        scheme_name: &str,
        request: &Request,
    ) -> Option<Box<dyn ResourceResponder>> {
        if scheme_name != self.registration.name {
            tracing::debug!(
                scheme = scheme_name,
                registered = %self.registration.name,
                "scheme not handled"
            );
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            responder = id,
            browser = browser.map(|b| b.id),
            frame = frame.map(|f| f.id),
            url = request.url(),
            "creating responder"
        );

        match self.content.route(request.url()) {
            Some(Route::Deferred { path }) => {
                let responder = DeferredStreamingResponder::with_policy(
                    id,
                    path.clone(),
                    Arc::clone(&self.policy),
                );
                self.track(responder.resume_handle());
                Some(Box::new(responder))
            }
            _ => Some(Box::new(StreamingResponder::new(id, Arc::clone(&self.content)))),
        }
    }
}

impl std::fmt::Debug for ResponderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderRegistry")
            .field("registration", &self.registration)
            .field("routes", &self.content.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
