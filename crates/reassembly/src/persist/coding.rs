//! Content-coding filters.
//!
//! A `Content-Encoding` value is resolved to a list of [`ContentCoding`]s, each
//! of which knows how to wrap a reader with the matching decompressor. Adding a
//! coding means adding a variant, its token and its wrapper.

use std::io::{self, BufRead, BufReader, Read};

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};

/// Buffer size handed to the brotli decompressor.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Content-codings that can be undone before a body is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Identity,
    Gzip,
    /// zlib wrapped deflate, or raw deflate as sent by some servers.
    Deflate,
    Br,
    Zstd,
}

impl ContentCoding {
    /// Looks up a single coding token, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        let coding = if token.eq_ignore_ascii_case("gzip") || token.eq_ignore_ascii_case("x-gzip") {
            Self::Gzip
        } else if token.eq_ignore_ascii_case("deflate") {
            Self::Deflate
        } else if token.eq_ignore_ascii_case("br") {
            Self::Br
        } else if token.eq_ignore_ascii_case("zstd") {
            Self::Zstd
        } else if token.eq_ignore_ascii_case("identity") {
            Self::Identity
        } else {
            return None;
        };
        Some(coding)
    }

    /// Resolves a full `Content-Encoding` value.
    ///
    /// Returns the codings in the order they have to be undone, last applied
    /// first, or `None` when one of them is unknown.
    pub fn parse_list(value: &str) -> Option<Vec<Self>> {
        let mut codings = value.split(',').filter(|token| !token.trim().is_empty()).map(Self::from_token).collect::<Option<Vec<_>>>()?;
        codings.reverse();
        Some(codings)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Br => "br",
            Self::Zstd => "zstd",
        }
    }

    /// Wraps `reader` with the decoder for this coding.
    pub fn wrap<'a>(self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        let decoded: Box<dyn Read + 'a> = match self {
            Self::Identity => reader,
            Self::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Self::Deflate => {
                let mut buffered = BufReader::new(reader);
                if is_zlib_header(buffered.fill_buf()?) {
                    Box::new(ZlibDecoder::new(buffered))
                } else {
                    Box::new(DeflateDecoder::new(buffered))
                }
            }
            Self::Br => Box::new(brotli::Decompressor::new(reader, BROTLI_BUFFER_SIZE)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        };
        Ok(decoded)
    }
}

/// Builds a reader that undoes `codings` on top of `body`.
pub fn decoding_reader<'a>(body: &'a [u8], codings: &[ContentCoding]) -> io::Result<Box<dyn Read + 'a>> {
    codings.iter().try_fold(Box::new(body) as Box<dyn Read + 'a>, |reader, coding| coding.wrap(reader))
}

/// RFC 1950: compression method 8 and a header checksum divisible by 31.
fn is_zlib_header(head: &[u8]) -> bool {
    match head {
        [cmf, flg, ..] => cmf & 0x0F == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}
