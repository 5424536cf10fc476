//! Start line and header field decoding for both directions.
//!
//! - [`RequestHeaderDecoder`]: request line + fields, request body framing
//! - [`ResponseHeaderDecoder`]: status line + fields, response body framing
//!
//! Both parse with `httparse`, record where each field name and value lives in
//! the receive buffer, then split the header section off as one `Bytes` and
//! hand out slices of it, so header values are not copied.
//!
//! # Limits
//!
//! - Maximum number of headers: 128
//! - Maximum header section size: 64KB
//! - HTTP/1.0 and HTTP/1.1 only

mod request_header_decoder;
mod response_header_decoder;

pub use request_header_decoder::RequestHeaderDecoder;
pub use response_header_decoder::ResponseHeaderDecoder;

use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Version};

use crate::protocol::{ParseError, PayloadSize};

/// Maximum number of headers allowed in one message
pub(crate) const MAX_HEADER_NUM: usize = 128;

/// Maximum size in bytes allowed for the entire header section
pub(crate) const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Decodes the header section of one message off the front of a buffer.
///
/// On success the header section is removed from `src` and the returned
/// [`PayloadSize`] tells how the body that follows is delimited. `Ok(None)`
/// means more bytes are needed and leaves `src` untouched.
pub trait HeaderDecoder {
    type Header;

    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<(Self::Header, PayloadSize)>, ParseError>;
}

/// Byte range positions of a header's name and value within the original buffer.
#[derive(Clone, Copy, Default)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>]) -> Vec<HeaderIndex> {
        let bytes_ptr = bytes.as_ptr() as usize;
        headers
            .iter()
            .map(|header| {
                let name_start = header.name.as_ptr() as usize - bytes_ptr;
                let value_start = header.value.as_ptr() as usize - bytes_ptr;
                HeaderIndex {
                    name: (name_start, name_start + header.name.len()),
                    value: (value_start, value_start + header.value.len()),
                }
            })
            .collect()
    }
}

/// Builds the header map from the split-off header section.
fn build_header_map(header_bytes: &Bytes, indices: &[HeaderIndex]) -> Result<HeaderMap, ParseError> {
    let mut headers = HeaderMap::with_capacity(indices.len());
    for index in indices {
        let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
        let value =
            HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1)).map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        // HTTP/2 and HTTP/3 framing is not reassembled
        _ => Err(ParseError::InvalidVersion(version)),
    }
}

fn map_httparse_error(e: httparse::Error) -> ParseError {
    match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        httparse::Error::Status => ParseError::InvalidStatus(None),
        httparse::Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_header(e),
    }
}

/// Drops everything up to and including the next LF, or the whole buffer
/// when no complete line is buffered.
///
/// Used to resynchronise after a malformed start line or header field: the
/// next decode attempt starts at the following line.
fn discard_line(src: &mut BytesMut) {
    match src.iter().position(|b| *b == b'\n') {
        Some(lf) => src.advance(lf + 1),
        None => src.clear(),
    }
}

/// Drops an oversized header section through the blank line that ends it.
///
/// Returns `false` when that line is not buffered yet. Everything but the last
/// two bytes is dropped then, so a terminator split across reads is still
/// found on the next call.
fn skip_oversized(src: &mut BytesMut) -> bool {
    let lf_lf = src.windows(2).position(|w| w == b"\n\n").map(|at| at + 2);
    let lf_crlf = src.windows(3).position(|w| w == b"\n\r\n").map(|at| at + 3);

    match lf_lf.into_iter().chain(lf_crlf).min() {
        Some(end) => {
            src.advance(end);
            true
        }
        None => {
            src.advance(src.len().saturating_sub(2));
            false
        }
    }
}

/// Selects body framing from `Transfer-Encoding` and `Content-Length`.
///
/// `Transfer-Encoding` wins when both are present (RFC 9112 section 6.3).
/// Returns `None` when neither a chunked transfer coding nor a
/// `Content-Length` delimits the body, which each direction treats differently.
fn framing_from_headers(headers: &HeaderMap) -> Result<Option<PayloadSize>, ParseError> {
    if let Some(te_value) = headers.get(http::header::TRANSFER_ENCODING) {
        return Ok(is_chunked(te_value).then_some(PayloadSize::Chunked));
    }

    match headers.get(http::header::CONTENT_LENGTH) {
        Some(cl_value) => {
            let cl_str = cl_value.to_str().map_err(ParseError::invalid_content_length)?;
            let length = cl_str.trim().parse::<u64>().map_err(|e| ParseError::invalid_content_length(format!("{cl_str:?}: {e}")))?;
            Ok(Some(PayloadSize::Length(length)))
        }
        None => Ok(None),
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// chunked must be the last encoding if present.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
