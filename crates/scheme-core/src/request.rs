use bytes::Bytes;

use crate::header::HeaderMap;

/// The request a host hands to a responder.
///
/// Read-only from the responder's point of view: it is inspected once in
/// `begin` and never mutated. The body is optional so that a `GET` with no
/// payload can be told apart from a `POST` with an empty one; the request
/// dump prints the two differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: String,
    method: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    /// A `GET` request with no headers and no body.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url, HeaderMap::new(), None::<Bytes>)
    }

    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: HeaderMap,
        body: Option<impl Into<Bytes>>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers,
            body: body.map(Into::into),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Post data, if the host attached any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Scheme portion of the URL (`client` for `client://tests/x`).
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }
}
