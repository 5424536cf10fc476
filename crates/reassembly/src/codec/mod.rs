//! HTTP codec module for decoding captured HTTP/1.x messages.
//!
//! Decoders implement `tokio_util::codec::Decoder` over a `BytesMut` receive
//! buffer and produce [`Message`](crate::protocol::Message) frames:
//!
//! - [`RequestDecoder`]: requests from the client direction
//! - [`ResponseDecoder`]: responses from the server direction
//! - Header parsing via the [`header`] module
//! - Payload decoding via the `body` module
//!
//! Unlike a server-side codec, errors never end the stream: every framing
//! error drops the offending bytes so the caller can keep decoding.

mod body;
pub mod header;
mod message_decoder;

pub use body::PayloadDecoder;
pub use message_decoder::{MessageDecoder, RequestDecoder, ResponseDecoder};
