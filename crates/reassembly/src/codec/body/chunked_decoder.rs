//! Decoder for HTTP chunked transfer coding
//! ([RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1)).
//!
//! Works line by line: a size line (hex size plus optional extensions), the
//! chunk data, its CRLF, and after the zero-size chunk a trailer section that
//! ends at an empty line. Extensions and trailer fields are read and dropped.

use std::cmp;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest size or trailer line accepted before the body is considered garbage
const MAX_LINE_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Expecting a chunk size line
    Size,
    /// Inside chunk data, with this many bytes left
    Data(u64),
    /// Expecting the CRLF that closes chunk data
    DataEnd,
    /// After the last chunk, skipping trailer fields up to the empty line
    Trailer,
    /// The empty line after the trailer section has been read
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` for every slice of chunk data
    /// - `Ok(Some(PayloadItem::Eof))` once the trailer section is consumed
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked framing is invalid
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::Size => {
                    let Some(line) = take_line(src)? else { return Ok(None) };
                    let size = parse_chunk_size(&line)?;
                    trace!(size, "read chunk size");
                    self.state = if size == 0 { ChunkedState::Trailer } else { ChunkedState::Data(size) };
                }

                ChunkedState::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    // bounded by src.len(), so it fits in usize
                    let len = cmp::min(remaining, src.len() as u64) as usize;
                    let bytes = src.split_to(len).freeze();
                    let left = remaining - len as u64;
                    self.state = if left == 0 { ChunkedState::DataEnd } else { ChunkedState::Data(left) };
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::DataEnd => match src.first() {
                    None => return Ok(None),
                    Some(b'\n') => {
                        src.advance(1);
                        self.state = ChunkedState::Size;
                    }
                    Some(b'\r') => match src.get(1) {
                        None => return Ok(None),
                        Some(b'\n') => {
                            src.advance(2);
                            self.state = ChunkedState::Size;
                        }
                        Some(_) => return Err(ParseError::invalid_body("invalid chunk body LF")),
                    },
                    Some(_) => return Err(ParseError::invalid_body("invalid chunk body CR")),
                },

                ChunkedState::Trailer => {
                    let Some(line) = take_line(src)? else { return Ok(None) };
                    if line.is_empty() {
                        self.state = ChunkedState::Done;
                    }
                }

                ChunkedState::Done => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
            }
        }
    }
}

/// Splits one line off `src`, without its CRLF (or bare LF).
fn take_line(src: &mut BytesMut) -> Result<Option<Bytes>, ParseError> {
    let Some(lf) = src.iter().position(|b| *b == b'\n') else {
        ensure!(src.len() <= MAX_LINE_BYTES, ParseError::invalid_body("chunk size or trailer line too long"));
        return Ok(None);
    };

    let mut line = src.split_to(lf + 1).freeze();
    line.truncate(lf);
    if line.last() == Some(&b'\r') {
        line.truncate(lf - 1);
    }
    Ok(Some(line))
}

/// Parses `1a;ext=value` style size lines.
fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let digits = line.split(|b| *b == b';').next().unwrap_or_default().trim_ascii();

    ensure!(
        !digits.is_empty() && digits.iter().all(u8::is_ascii_hexdigit),
        ParseError::invalid_body("invalid chunk size line: Invalid Size")
    );

    digits
        .iter()
        .try_fold(0u64, |size, b| {
            let digit = u64::from(char::from(*b).to_digit(16).unwrap_or_default());
            size.checked_mul(16).and_then(|size| size.checked_add(digit))
        })
        .ok_or_else(|| ParseError::invalid_body("invalid overflow chunked length"))
}
