//! HTTP message decoder shared by both directions.
//!
//! [`MessageDecoder`] alternates between two phases:
//! 1. Header parsing, delegated to a [`HeaderDecoder`]
//! 2. Payload parsing, delegated to a [`PayloadDecoder`] picked from the header
//!
//! It yields one `Message::Header` per message, then the body as
//! `Message::Payload` frames ending in `PayloadItem::Eof`, and leaves the
//! buffer at the start of the next message.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_reassembly::codec::RequestDecoder;
//! use micro_reassembly::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET /a HTTP/1.1\r\nHost: x\r\n\r\n");
//! let frame = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert!(frame.is_header());
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{HeaderDecoder, RequestHeaderDecoder, ResponseHeaderDecoder};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize};

/// Decodes requests from the client direction.
pub type RequestDecoder = MessageDecoder<RequestHeaderDecoder>;

/// Decodes responses from the server direction.
pub type ResponseDecoder = MessageDecoder<ResponseHeaderDecoder>;

/// # State Machine
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
///
/// Any error resets it to header parsing, so decoding resumes with the next
/// message instead of giving up on the stream.
#[derive(Debug)]
pub struct MessageDecoder<D> {
    header_decoder: D,
    payload_decoder: Option<PayloadDecoder>,
}

impl<D: HeaderDecoder + Default> MessageDecoder<D> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: HeaderDecoder + Default> Default for MessageDecoder<D> {
    fn default() -> Self {
        Self { header_decoder: D::default(), payload_decoder: None }
    }
}

impl<D: HeaderDecoder> MessageDecoder<D> {
    /// Whether a header has been decoded and its body is still being read.
    pub fn in_body(&self) -> bool {
        self.payload_decoder.is_some()
    }

    fn payload_frame(&mut self, result: Result<Option<PayloadItem>, ParseError>) -> Result<Option<Message<(D::Header, PayloadSize)>>, ParseError> {
        match result {
            Ok(Some(item)) => {
                if item.is_eof() {
                    // no need payload decoder in this message now
                    self.payload_decoder.take();
                }
                Ok(Some(Message::Payload(item)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.payload_decoder.take();
                Err(e)
            }
        }
    }
}

impl<D: HeaderDecoder> Decoder for MessageDecoder<D> {
    type Item = Message<(D::Header, PayloadSize)>;
    type Error = ParseError;

    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: decoded the header of the next message
    /// - `Ok(Some(Message::Payload(_)))`: decoded a body chunk or the end of the body
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: framing error, the offending bytes have been dropped
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let result = payload_decoder.decode(src);
            return self.payload_frame(result);
        }

        match self.header_decoder.decode_header(src)? {
            Some((header, payload_size)) => {
                trace!(?payload_size, "decoded message header");
                self.payload_decoder = Some(payload_size.into());
                Ok(Some(Message::Header((header, payload_size))))
            }
            None => Ok(None),
        }
    }

    /// Called once the direction has closed.
    ///
    /// A body in progress ends with what was received. Leftover bytes that do
    /// not form a complete header are dropped and reported as
    /// [`ParseError::Incomplete`]; trailing blank lines are dropped silently.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let result = payload_decoder.finish(src);
            return self.payload_frame(result);
        }

        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.iter().all(u8::is_ascii_whitespace) => {
                src.clear();
                Ok(None)
            }
            None => {
                let remaining = src.len();
                src.clear();
                Err(ParseError::incomplete(remaining))
            }
        }
    }
}
