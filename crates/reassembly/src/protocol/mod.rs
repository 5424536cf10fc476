//! Core HTTP protocol types shared by the decoders, the connection loops and
//! the body pipeline.
//!
//! - **Message framing** ([`Message`], [`PayloadItem`], [`PayloadSize`]): the
//!   frames produced by the codec layer
//! - **Headers** ([`RequestHeader`], [`ResponseHeader`]): decoded start line and
//!   header fields
//! - **Assembled messages** ([`DecodedMessage`]): header plus the body read for
//!   it
//! - **Errors** ([`ParseError`], [`PersistError`])

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;
pub(crate) use request::lenient_uri;

mod response;
pub use response::ResponseHeader;

mod decoded;
pub use decoded::DecodedMessage;
pub use decoded::DecodedRequest;
pub use decoded::DecodedResponse;

mod error;
pub use error::ParseError;
pub use error::PersistError;
