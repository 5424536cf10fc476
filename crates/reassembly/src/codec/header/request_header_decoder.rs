//! Request line and header decoding.
//!
//! Parses method, target and version with `httparse`, builds the header map
//! from slices of the split-off header section, then picks the request body
//! framing:
//!
//! 1. `Transfer-Encoding` ending in `chunked`: chunked body
//! 2. `Content-Length`: fixed length body
//! 3. neither: no body
//!
//! A request whose transfer coding does not end in `chunked` cannot be
//! delimited and is rejected.

use bytes::BytesMut;
use http::{Method, Request};
use httparse::Status;
use tracing::{debug, trace};

use super::{
    HeaderDecoder, HeaderIndex, MAX_HEADER_BYTES, MAX_HEADER_NUM, build_header_map, discard_line, framing_from_headers,
    map_httparse_error, parse_version, skip_oversized,
};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, lenient_uri};

/// Decoder for the header section of HTTP requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHeaderDecoder {
    /// Inside a header section already reported as too large.
    skipping_oversized: bool,
}

impl HeaderDecoder for RequestHeaderDecoder {
    type Header = RequestHeader;

    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The request line or a header field is malformed
    /// - The number of headers exceeds `MAX_HEADER_NUM`
    /// - The header section exceeds `MAX_HEADER_BYTES`
    /// - The HTTP version is not 1.0 or 1.1
    /// - The body framing headers are invalid
    ///
    /// Malformed lines are dropped from `src` before the error is returned;
    /// a header section that parsed but failed validation is dropped whole,
    /// and an oversized one is dropped through its blank line with a single
    /// error.
    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        if self.skipping_oversized {
            if !skip_oversized(src) {
                return Ok(None);
            }
            self.skipping_oversized = false;
        }

        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let body_offset = match req.parse(src) {
            Ok(Status::Complete(body_offset)) => body_offset,
            Ok(Status::Partial) => {
                if src.len() > MAX_HEADER_BYTES {
                    let current_size = src.len();
                    self.skipping_oversized = !skip_oversized(src);
                    return Err(ParseError::too_large_header(current_size, MAX_HEADER_BYTES));
                }
                return Ok(None);
            }
            Err(e) => {
                discard_line(src);
                return Err(map_httparse_error(e));
            }
        };
        trace!(header_size = body_offset, "parsed request header");

        let method = req
            .method
            .ok_or(ParseError::InvalidMethod)
            .and_then(|method| Method::from_bytes(method.as_bytes()).map_err(|_e| ParseError::InvalidMethod));
        let target = req.path.ok_or(ParseError::InvalidUri).map(str::to_owned);
        let version = parse_version(req.version);
        let indices = HeaderIndex::record(src, req.headers);

        let header_bytes = src.split_to(body_offset).freeze();
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let target = target?;
        let uri = lenient_uri(&target);
        if uri.to_string() != target {
            debug!(target = %target, uri = %uri, "request target escaped");
        }

        let mut request = Request::new(());
        *request.method_mut() = method?;
        *request.uri_mut() = uri;
        *request.version_mut() = version?;
        *request.headers_mut() = build_header_map(&header_bytes, &indices)?;
        let header = RequestHeader::new(request, target);

        let payload_size = match framing_from_headers(header.headers())? {
            Some(payload_size) => payload_size,
            None if header.headers().contains_key(http::header::TRANSFER_ENCODING) => {
                return Err(ParseError::invalid_header("request transfer-encoding does not end in chunked"));
            }
            None => PayloadSize::Empty,
        };

        Ok(Some((header, payload_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Version};
    use indoc::indoc;

    #[test]
    fn leaves_body_in_buffer() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut bytes = BytesMut::from(str);

        let result = RequestHeaderDecoder::default().decode_header(&mut bytes).unwrap();

        assert!(result.is_some());
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);

        let (header, payload_size) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert!(buf.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.target(), "/index.html");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
    }

    #[test]
    fn from_edge_with_query() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        Accept-Encoding: gzip, deflate, br

        "##};

        let mut buf = BytesMut::from(str);

        let (header, _) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();

        assert_eq!(header.uri().path(), "/index/");
        assert_eq!(header.uri().query(), Some("a=1&b=2&a=3"));
        assert_eq!(header.target(), "/index/?a=1&b=2&a=3");
        assert_eq!(
            header.headers().get("sec-ch-ua"),
            Some(&HeaderValue::from_static(r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##))
        );
    }

    #[test]
    fn body_framing() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let (_, payload_size) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(5));

        // a GET may carry a body too; a passive observer must still consume it
        let mut buf = BytesMut::from("GET /q HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}");
        let (_, payload_size) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(2));

        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        let (_, payload_size) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn non_chunked_transfer_encoding_rejected() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\nGET / HTTP/1.1\r\n\r\n");
        let result = RequestHeaderDecoder::default().decode_header(&mut buf);
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));
        // the rejected header section is gone, the next request is intact
        assert_eq!(&buf[..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn partial_header_needs_more() {
        let partial = "GET /index.html HTTP/1.1\r\nHost: 127.0.0.1";
        let mut buf = BytesMut::from(partial);
        assert!(RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), partial.len());
    }

    #[test]
    fn malformed_line_is_dropped() {
        let mut buf = BytesMut::from("Host: x\r\nGET /a HTTP/1.1\r\n\r\n");
        assert!(RequestHeaderDecoder::default().decode_header(&mut buf).is_err());
        assert_eq!(&buf[..], b"GET /a HTTP/1.1\r\n\r\n");

        let (header, _) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert_eq!(header.target(), "/a");
    }

    #[test]
    fn http2_preface_rejected() {
        let mut buf = BytesMut::from("PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n");
        assert!(RequestHeaderDecoder::default().decode_header(&mut buf).is_err());
    }

    #[test]
    fn target_rejected_by_uri_is_kept_verbatim() {
        let mut buf = BytesMut::from("POST /api?q=\"x\"&f={a} HTTP/1.1\r\nContent-Length: 4\r\n\r\nbodyGET /b HTTP/1.1\r\n\r\n");
        let (header, payload_size) = RequestHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();

        assert_eq!(header.target(), r#"/api?q="x"&f={a}"#);
        assert_eq!(header.uri().path(), "/api");
        assert_eq!(payload_size, PayloadSize::Length(4));
        assert_eq!(&buf[..], b"bodyGET /b HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn oversized_header_reported_once() {
        let mut decoder = RequestHeaderDecoder::default();
        let mut buf = BytesMut::from("GET /big HTTP/1.1\r\nX-Big: ");
        buf.extend_from_slice(&vec![b'a'; MAX_HEADER_BYTES + 100]);
        assert!(matches!(decoder.decode_header(&mut buf), Err(ParseError::TooLargeHeader { .. })));

        // the rest of the oversized section arrives later and is dropped silently
        buf.extend_from_slice(b"X-Tail: z\r\nX-Tail: z\r\n\r\nGET /after HTTP/1.1\r\n\r\n");
        let (header, _) = decoder.decode_header(&mut buf).unwrap().unwrap();
        assert_eq!(header.target(), "/after");
        assert!(buf.is_empty());
    }
}
