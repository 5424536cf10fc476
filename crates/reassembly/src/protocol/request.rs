//! HTTP request header handling.
//!
//! Wraps `http::Request<()>` so the decoded start line and header fields of a
//! captured request can be inspected without carrying a body type around. The
//! request target is kept verbatim next to it: captured clients send targets
//! that `http::Uri` refuses, and the target is what pairs a response with its
//! request.

use http::{HeaderMap, Method, Request, Uri, Version};

/// Represents a decoded HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
    target: Box<str>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Pairs a request with the target exactly as it appeared on the wire.
    pub fn new(inner: Request<()>, target: impl Into<Box<str>>) -> Self {
        Self { inner, target: target.into() }
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// The target as a `Uri`.
    ///
    /// Targets `Uri` rejects as sent are percent-escaped first; when even that
    /// fails this is `/`. Use [`target`](Self::target) for the raw form.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The request target as it appeared on the request line.
    ///
    /// Origin-form targets keep their query (`/a/b?x=1`), absolute-form
    /// targets keep scheme and authority. This is the identifier pushed onto
    /// the connection's correlator.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        let target = inner.uri().to_string();
        Self::new(inner, target)
    }
}

/// Parses a raw request target into a `Uri`, escaping bytes it refuses.
pub(crate) fn lenient_uri(target: &str) -> Uri {
    if let Ok(uri) = target.parse::<Uri>() {
        return uri;
    }

    let mut escaped = String::with_capacity(target.len() + 8);
    for b in target.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@/?%[]".contains(&b) {
            escaped.push(char::from(b));
        } else {
            escaped.push('%');
            escaped.push_str(&hex::encode_upper([b]));
        }
    }
    escaped.parse().unwrap_or_default()
}
