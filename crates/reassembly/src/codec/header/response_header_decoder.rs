//! Status line and header decoding.
//!
//! Response body framing follows RFC 9112 section 6.3, minus the rule that
//! needs the request method (HEAD): the decoder only sees one direction.
//!
//! 1. 1xx, 204 and 304: no body
//! 2. `Transfer-Encoding` ending in `chunked`: chunked body
//! 3. `Content-Length`: fixed length body
//! 4. otherwise: the body runs until the server closes the connection

use bytes::BytesMut;
use http::{Response, StatusCode};
use httparse::Status;
use tracing::trace;

use super::{
    HeaderDecoder, HeaderIndex, MAX_HEADER_BYTES, MAX_HEADER_NUM, build_header_map, discard_line, framing_from_headers,
    map_httparse_error, parse_version, skip_oversized,
};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, ResponseHeader};

/// Decoder for the header section of HTTP responses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseHeaderDecoder {
    /// Inside a header section already reported as too large.
    skipping_oversized: bool,
}

impl HeaderDecoder for ResponseHeaderDecoder {
    type Header = ResponseHeader;

    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<(ResponseHeader, PayloadSize)>, ParseError> {
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
        let mut res = httparse::Response::new(&mut headers);

        let body_offset = match res.parse(src) {
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
        trace!(header_size = body_offset, "parsed response header");

        let status = res
            .code
            .ok_or(ParseError::InvalidStatus(None))
            .and_then(|code| StatusCode::from_u16(code).map_err(|_e| ParseError::InvalidStatus(Some(code))));
        let reason = res.reason.unwrap_or_default().to_owned();
        let version = parse_version(res.version);
        let indices = HeaderIndex::record(src, res.headers);

        let header_bytes = src.split_to(body_offset).freeze();
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let mut response = Response::new(());
        *response.status_mut() = status?;
        *response.version_mut() = version?;
        *response.headers_mut() = build_header_map(&header_bytes, &indices)?;
        let header = ResponseHeader::new(response, reason);

        let payload_size = if header.is_bodiless() {
            PayloadSize::Empty
        } else {
            framing_from_headers(header.headers())?.unwrap_or(PayloadSize::UntilClose)
        };

        Ok(Some((header, payload_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn from_nginx() {
        let str = indoc! {r##"
        HTTP/1.1 200 OK
        Server: nginx/1.25.3
        Content-Type: text/html; charset=utf-8
        Content-Length: 12
        Content-Encoding: gzip

        hello world!"##};

        let mut buf = BytesMut::from(str);

        let (header, payload_size) = ResponseHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();

        assert_eq!(header.status(), StatusCode::OK);
        assert_eq!(header.status_line(), "200 OK");
        assert_eq!(header.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(header.content_encoding(), Some("gzip"));
        assert_eq!(payload_size, PayloadSize::Length(12));
        assert_eq!(&buf[..], b"hello world!");
    }

    #[test]
    fn body_until_close_without_framing_headers() {
        let mut buf = BytesMut::from("HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nstreamed");
        let (header, payload_size) = ResponseHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert_eq!(header.version(), http::Version::HTTP_10);
        assert_eq!(payload_size, PayloadSize::UntilClose);
    }

    #[test]
    fn bodiless_statuses_ignore_content_length() {
        let mut buf = BytesMut::from("HTTP/1.1 304 Not Modified\r\nContent-Length: 1024\r\n\r\nHTTP/1.1 200 OK\r\n");
        let (_, payload_size) = ResponseHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_empty());
        assert_eq!(&buf[..], b"HTTP/1.1 200 OK\r\n");

        let mut buf = BytesMut::from("HTTP/1.1 100 Continue\r\n\r\n");
        let (header, payload_size) = ResponseHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert!(header.is_interim());
        assert!(payload_size.is_empty());
    }

    #[test]
    fn chunked_response() {
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        let (_, payload_size) = ResponseHeaderDecoder::default().decode_header(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn garbage_status_line() {
        let mut buf = BytesMut::from("HTTP/1.1 abc OK\r\n\r\n");
        assert!(ResponseHeaderDecoder::default().decode_header(&mut buf).is_err());
        assert_eq!(&buf[..], b"\r\n");
    }

    #[test]
    fn oversized_header_skipped_whole() {
        let mut decoder = ResponseHeaderDecoder::default();
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nSet-Cookie: ");
        buf.extend_from_slice(&vec![b'c'; super::MAX_HEADER_BYTES + 1]);
        buf.extend_from_slice(b"\r\nX-Other: 1\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n");

        assert!(matches!(decoder.decode_header(&mut buf), Err(ParseError::TooLargeHeader { .. })));
        let (header, _) = decoder.decode_header(&mut buf).unwrap().unwrap();
        assert_eq!(header.status(), StatusCode::NO_CONTENT);
    }
}
