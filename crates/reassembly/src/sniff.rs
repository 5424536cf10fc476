//! Content type detection for bodies that arrive without a `Content-Type`.
//!
//! Follows the WHATWG MIME sniffing table: at most the first 512 bytes are
//! inspected, signatures are tried in order and the first match wins. Data
//! without any match is `text/plain; charset=utf-8` when it contains no binary
//! control bytes and `application/octet-stream` otherwise.

/// Number of leading bytes looked at.
pub const SNIFF_LEN: usize = 512;

const TEXT_UTF8: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

enum Signature {
    /// Case-insensitive HTML tag after optional whitespace, followed by a space or `>`.
    Html(&'static [u8]),
    /// Exact prefix after optional whitespace.
    SkipWs(&'static [u8], &'static str),
    /// Exact prefix.
    Exact(&'static [u8], &'static str),
    /// Prefix where `?` in the pattern matches any byte.
    Masked(&'static [u8], &'static str),
    Mp4,
}

const HTML: &str = "text/html; charset=utf-8";

const SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::SkipWs(b"<?xml", "text/xml; charset=utf-8"),
    Signature::Exact(b"%PDF-", "application/pdf"),
    Signature::Exact(b"%!PS-Adobe-", "application/postscript"),
    // byte order marks
    Signature::Exact(b"\xFE\xFF", "text/plain; charset=utf-16be"),
    Signature::Exact(b"\xFF\xFE", "text/plain; charset=utf-16le"),
    Signature::Exact(b"\xEF\xBB\xBF", TEXT_UTF8),
    // images
    Signature::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Exact(b"BM", "image/bmp"),
    Signature::Exact(b"GIF87a", "image/gif"),
    Signature::Exact(b"GIF89a", "image/gif"),
    Signature::Masked(b"RIFF????WEBPVP", "image/webp"),
    Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Signature::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    // audio and video
    Signature::Masked(b"FORM????AIFF", "audio/aiff"),
    Signature::Exact(b"ID3", "audio/mpeg"),
    Signature::Exact(b"OggS\x00", "application/ogg"),
    Signature::Exact(b"MThd\x00\x00\x00\x06", "audio/midi"),
    Signature::Masked(b"RIFF????AVI ", "video/avi"),
    Signature::Masked(b"RIFF????WAVE", "audio/wave"),
    Signature::Mp4,
    Signature::Exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    // fonts
    Signature::Exact(b"\x00\x01\x00\x00", "font/ttf"),
    Signature::Exact(b"OTTO", "font/otf"),
    Signature::Exact(b"ttcf", "font/collection"),
    Signature::Exact(b"wOFF", "font/woff"),
    Signature::Exact(b"wOF2", "font/woff2"),
    // archives
    Signature::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Signature::Exact(b"PK\x03\x04", "application/zip"),
    Signature::Exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Signature::Exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    Signature::Exact(b"\x00asm", "application/wasm"),
];

/// Guesses the media type of `data`. Always returns a valid type.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data.iter().position(|b| !is_ws(*b)).unwrap_or(data.len());
    let trimmed = &data[first_non_ws..];

    for signature in SIGNATURES {
        let matched = match signature {
            Signature::Html(tag) => matches_html(trimmed, tag).then_some(HTML),
            Signature::SkipWs(prefix, ct) => trimmed.starts_with(prefix).then_some(*ct),
            Signature::Exact(prefix, ct) => data.starts_with(prefix).then_some(*ct),
            Signature::Masked(pattern, ct) => matches_masked(data, pattern).then_some(*ct),
            Signature::Mp4 => is_mp4(data).then_some("video/mp4"),
        };
        if let Some(content_type) = matched {
            return content_type;
        }
    }

    if data.iter().any(|b| is_binary(*b)) { OCTET_STREAM } else { TEXT_UTF8 }
}

fn is_ws(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn matches_html(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }
    let head_matches = tag.iter().zip(data).all(|(t, d)| if t.is_ascii_uppercase() { d.to_ascii_uppercase() == *t } else { d == t });
    head_matches && matches!(data[tag.len()], b' ' | b'>')
}

fn matches_masked(data: &[u8], pattern: &[u8]) -> bool {
    data.len() >= pattern.len() && pattern.iter().zip(data).all(|(p, d)| *p == b'?' || p == d)
}

/// ISO base media file with an `mp4*` brand in its `ftyp` box.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if !box_size.is_multiple_of(4) || box_size > data.len() || &data[4..8] != b"ftyp" {
        return false;
    }

    // major brand at 8, compatible brands from 16 on; 12..16 is the version
    (8..box_size).step_by(4).filter(|at| *at != 12).any(|at| data.get(at..at + 3) == Some(&b"mp4"[..]))
}
