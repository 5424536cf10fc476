//! Body decoding for captured messages.
//!
//! - [`PayloadDecoder`]: selects the framing strategy from the header
//! - `LengthDecoder`: `Content-Length` delimited bodies
//! - `ChunkedDecoder`: chunked transfer coding
//!
//! Bodies that run until the connection closes are handled by
//! [`PayloadDecoder`] directly.

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub use payload_decoder::PayloadDecoder;
