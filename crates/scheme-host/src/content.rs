//! Target → content routing.
//!
//! A [`ContentMap`] holds an immutable, ordered list of routes built with
//! [`ContentMapBuilder`]. Targets are opaque strings; a route matches when its
//! pattern occurs anywhere in the request URL, and the first matching route
//! wins. The map is shared by every responder the registry creates.
//!
//! This module also renders the request-dump page served for the diagnostic
//! route.

use std::path::PathBuf;

use bytes::Bytes;
use scheme_core::Request;

/// What a matched target is served from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// HTML page echoing the inbound request.
    Diagnostic,
    /// A bundled file, read into memory when the request begins.
    Asset { path: PathBuf, mime_type: String },
    /// Fixed bytes registered up front.
    Static { data: Bytes, mime_type: String },
    /// An external stream served by the deferred responder.
    Deferred { path: PathBuf },
}

/// Immutable, ordered route table.
#[derive(Clone, Debug, Default)]
pub struct ContentMap {
    routes: Vec<(String, Route)>,
}

/// Builder for a [`ContentMap`]. Routes match in registration order.
#[derive(Debug, Default)]
pub struct ContentMapBuilder {
    routes: Vec<(String, Route)>,
}

impl ContentMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the request-dump page for URLs containing `pattern`.
    pub fn with_diagnostic(mut self, pattern: &str) -> Self {
        self.routes.push((pattern.to_string(), Route::Diagnostic));
        self
    }

    /// Serve the file at `path` for URLs containing `pattern`.
    pub fn with_asset(mut self, pattern: &str, mime_type: &str, path: impl Into<PathBuf>) -> Self {
        self.routes.push((
            pattern.to_string(),
            Route::Asset {
                path: path.into(),
                mime_type: mime_type.to_string(),
            },
        ));
        self
    }

    /// Serve fixed bytes for URLs containing `pattern`.
    pub fn with_static(mut self, pattern: &str, mime_type: &str, data: impl Into<Bytes>) -> Self {
        self.routes.push((
            pattern.to_string(),
            Route::Static {
                data: data.into(),
                mime_type: mime_type.to_string(),
            },
        ));
        self
    }

    /// Stream the file at `path` through the deferred responder for URLs
    /// containing `pattern`.
    pub fn with_deferred(mut self, pattern: &str, path: impl Into<PathBuf>) -> Self {
        self.routes
            .push((pattern.to_string(), Route::Deferred { path: path.into() }));
        self
    }

    pub fn build(self) -> ContentMap {
        ContentMap {
            routes: self.routes,
        }
    }
}

impl ContentMap {
    pub fn builder() -> ContentMapBuilder {
        ContentMapBuilder::new()
    }

    /// First route whose pattern occurs in `url`.
    pub fn route(&self, url: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, route)| route)
    }

    /// Whether `url` is served by the deferred responder.
    pub fn is_deferred(&self, url: &str) -> bool {
        matches!(self.route(url), Some(Route::Deferred { .. }))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

const PAGE_HEAD: &str = "<html><head><title>Client Scheme Handler</title></head><body>\
    The contents of this page are served by the responder \
    handling the client:// protocol.\
    <br/>You should see an image:\
    <br/><img src=\"client://tests/client.png\"><pre>";

const PAGE_TAIL: &str = "</pre><br/>Try the test form:\
    <form method=\"POST\" action=\"handler.html\">\
    <input type=\"text\" name=\"field1\">\
    <input type=\"text\" name=\"field2\">\
    <input type=\"submit\">\
    </form></body></html>";

/// Render the diagnostic page: a fixed frame around [`dump_request`].
///
/// The dump is embedded verbatim, so form bodies such as
/// `field1=a&field2=b` appear exactly as posted.
pub fn diagnostic_page(request: &Request) -> String {
    let dump = dump_request(request);
    let mut page = String::with_capacity(PAGE_HEAD.len() + dump.len() + PAGE_TAIL.len());
    page.push_str(PAGE_HEAD);
    page.push_str(&dump);
    page.push_str(PAGE_TAIL);
    page
}

/// Plain-text dump of a request: URL, method, headers, post data.
///
/// ```text
/// URL: client://tests/handler.html
/// Method: POST
/// Headers:
///     Content-Type: application/x-www-form-urlencoded
/// Post Data:
///     Bytes: field1=a&field2=b
/// ```
///
/// Header and post-data lines are tab-indented. A body that is present but
/// empty prints as `(empty)`; a missing body omits the section.
pub fn dump_request(request: &Request) -> String {
    let mut out = format!("URL: {}\nMethod: {}", request.url(), request.method());

    if !request.headers().is_empty() {
        out.push_str("\nHeaders:");
        for header in request.headers().iter() {
            out.push_str(&format!("\n\t{}: {}", header.name, header.value));
        }
    }

    if let Some(body) = request.body() {
        out.push_str("\nPost Data:\n\tBytes: ");
        if body.is_empty() {
            out.push_str("(empty)");
        } else {
            out.push_str(&String::from_utf8_lossy(body));
        }
    }

    out
}
