//! HTTP response header handling.
//!
//! [`ResponseHeader`] wraps `http::Response<()>` and keeps the reason phrase
//! exactly as the server sent it, since captured servers do not always use the
//! canonical one.

use http::{HeaderMap, Response, StatusCode, Version};

/// Represents a decoded HTTP response header.
#[derive(Debug)]
pub struct ResponseHeader {
    inner: Response<()>,
    reason: Box<str>,
}

impl ResponseHeader {
    pub fn new(inner: Response<()>, reason: impl Into<Box<str>>) -> Self {
        Self { inner, reason: reason.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Status code and reason, e.g. `200 OK`.
    ///
    /// Falls back to the canonical reason when the server sent none.
    pub fn status_line(&self) -> String {
        let reason = if self.reason.is_empty() { self.status().canonical_reason().unwrap_or("") } else { &self.reason };
        format!("{} {}", self.status().as_u16(), reason).trim_end().to_string()
    }

    /// Interim responses (1xx) except `101 Switching Protocols`.
    ///
    /// These precede the final response to the same request and are not
    /// paired with a pending request.
    pub fn is_interim(&self) -> bool {
        self.status().is_informational() && self.status() != StatusCode::SWITCHING_PROTOCOLS
    }

    /// Responses that never carry a body regardless of their headers.
    pub fn is_bodiless(&self) -> bool {
        let status = self.status();
        status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
    }

    /// The first `Content-Type` value, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(http::header::CONTENT_TYPE)
    }

    /// The first `Content-Encoding` value, if present.
    pub fn content_encoding(&self) -> Option<&str> {
        self.header_str(http::header::CONTENT_ENCODING)
    }

    fn header_str(&self, name: http::header::HeaderName) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }
}

impl From<Response<()>> for ResponseHeader {
    fn from(inner: Response<()>) -> Self {
        Self { inner, reason: "".into() }
    }
}
