//! Structured events emitted for every reassembled exchange.
//!
//! The connection loops never log exchanges themselves, they hand an event to
//! an [`ExchangeObserver`]. [`TracingObserver`] is the default and writes one
//! `info` record per event.

use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::info;

use crate::persist::Artifact;

/// A request decoded from the client direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub connection: Arc<str>,
    pub method: Method,
    /// Request target as it appeared on the request line.
    pub url: String,
    pub body_len: usize,
}

/// A response decoded from the server direction, paired with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    pub connection: Arc<str>,
    /// Status code and reason phrase, e.g. `200 OK`.
    pub status: String,
    /// Identifier of the paired request, or the no-request sentinel.
    pub url: String,
    /// `Content-Length` when it framed the body.
    pub declared_length: Option<u64>,
    pub observed_length: usize,
    pub length_matches: bool,
    /// Declared or sniffed media type.
    pub content_type: String,
    pub content_encoding: Option<String>,
    /// Set when the body was written to disk.
    pub artifact: Option<Artifact>,
}

impl ResponseEvent {
    /// `declared,observed` or `declared!=observed`.
    pub fn length_summary(&self) -> LengthSummary<'_> {
        LengthSummary(self)
    }
}

#[derive(Debug)]
pub struct LengthSummary<'a>(&'a ResponseEvent);

impl fmt::Display for LengthSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = self.0;
        let separator = if event.length_matches { "," } else { "!=" };
        match event.declared_length {
            Some(declared) => write!(f, "{declared}{separator}{}", event.observed_length),
            None => write!(f, "-{separator}{}", event.observed_length),
        }
    }
}

/// Receives exchange events from every connection of a capture.
///
/// Called from the connection tasks, possibly from many threads at once.
#[cfg_attr(test, mockall::automock)]
pub trait ExchangeObserver: Send + Sync {
    fn on_request(&self, event: &RequestEvent);

    fn on_response(&self, event: &ResponseEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExchangeObserver for TracingObserver {
    fn on_request(&self, event: &RequestEvent) {
        info!(conn = %event.connection, method = %event.method, url = %event.url, body_len = event.body_len, "http request");
    }

    fn on_response(&self, event: &ResponseEvent) {
        info!(
            conn = %event.connection,
            status = %event.status,
            url = %event.url,
            length = %event.length_summary(),
            content_type = %event.content_type,
            encoding = event.content_encoding.as_deref().unwrap_or(""),
            artifact = ?event.artifact.as_ref().map(|artifact| &artifact.path),
            "http response"
        );
    }
}

/// Canonical hex dump: offset, 16 hex bytes split in two groups, printable ascii.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(16) * 79);

    for (index, line) in data.chunks(16).enumerate() {
        let encoded = hex::encode(line);
        out.push_str(&format!("{:08x}  ", index * 16));

        for column in 0..16 {
            match encoded.get(column * 2..column * 2 + 2) {
                Some(pair) => {
                    out.push_str(pair);
                    out.push(' ');
                }
                None => out.push_str("   "),
            }
            if column == 7 || column == 15 {
                out.push(' ');
            }
        }

        out.push('|');
        out.extend(line.iter().map(|b| if b.is_ascii_graphic() || *b == b' ' { char::from(*b) } else { '.' }));
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(declared_length: Option<u64>, observed_length: usize, length_matches: bool) -> ResponseEvent {
        ResponseEvent {
            connection: Arc::from("c1"),
            status: "200 OK".into(),
            url: "/a".into(),
            declared_length,
            observed_length,
            length_matches,
            content_type: "text/plain".into(),
            content_encoding: None,
            artifact: None,
        }
    }

    #[test]
    fn length_summary_marks_mismatch() {
        assert_eq!(response(Some(10), 7, false).length_summary().to_string(), "10!=7");
        assert_eq!(response(Some(3), 3, true).length_summary().to_string(), "3,3");
        assert_eq!(response(None, 5, true).length_summary().to_string(), "-,5");
    }

    #[test]
    fn hexdump_layout() {
        let expected = format!("00000000  68 65 6c 6c 6f 20 77 6f  72 6c 64 0a{}|hello world.|\n", " ".repeat(14));
        assert_eq!(hexdump(b"hello world\n"), expected);

        let full: Vec<u8> = (0x2e..0x3e).collect();
        assert_eq!(hexdump(&full), "00000000  2e 2f 30 31 32 33 34 35  36 37 38 39 3a 3b 3c 3d  |./0123456789:;<=|\n");

        assert_eq!(hexdump(b""), "");
        assert!(hexdump(&[0u8; 17]).starts_with("00000000  00"));
        assert!(hexdump(&[0u8; 17]).contains("\n00000010  00 "));
    }

    #[test]
    fn observer_is_object_safe() {
        let mut mock = MockExchangeObserver::new();
        mock.expect_on_response().withf(|event| event.url == "/a").times(1).return_const(());

        let observer: Arc<dyn ExchangeObserver> = Arc::new(mock);
        observer.on_response(&response(None, 0, true));
    }
}
