use bytes::Bytes;

use crate::protocol::{PayloadSize, RequestHeader, ResponseHeader};

/// A fully assembled message: header, framing and the body bytes read for it.
///
/// Only lives for one correlation and persistence cycle.
#[derive(Debug)]
pub struct DecodedMessage<H> {
    header: H,
    payload_size: PayloadSize,
    body: Bytes,
}

pub type DecodedRequest = DecodedMessage<RequestHeader>;
pub type DecodedResponse = DecodedMessage<ResponseHeader>;

impl<H> DecodedMessage<H> {
    pub fn new(header: H, payload_size: PayloadSize, body: Bytes) -> Self {
        Self { header, payload_size, body }
    }

    pub fn header(&self) -> &H {
        &self.header
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (H, Bytes) {
        (self.header, self.body)
    }

    /// Length declared by `Content-Length`, when that header framed the body.
    pub fn declared_length(&self) -> Option<u64> {
        self.payload_size.declared_length()
    }

    /// Whether the observed body agrees with the declared length.
    ///
    /// Only a known, positive declared length can disagree.
    pub fn length_matches(&self) -> bool {
        match self.declared_length() {
            Some(declared) if declared > 0 => declared == self.body.len() as u64,
            _ => true,
        }
    }
}
