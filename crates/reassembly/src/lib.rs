//! Reassembles HTTP/1.x exchanges from the two byte streams of a captured connection
//!
//! Capture, TCP reassembly and TLS decryption happen elsewhere. This crate takes
//! the resulting ordered bytes of each direction, decodes the requests and
//! responses in them, pairs every response with the request that preceded it and
//! writes response bodies to disk.
//!
//! # Example
//!
//! ```no_run
//! use micro_reassembly::capture::Capture;
//! use micro_reassembly::config::CaptureConfig;
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let capture = Capture::with_tracing(CaptureConfig::new().output_dir("/tmp/bodies"));
//!     let mut connection = capture.open("192.168.1.2:50412 -> 93.184.216.34:80");
//!
//!     // whatever the reassembler delivers, in order, per direction
//!     connection.client.send(&b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n"[..]).await.unwrap();
//!     connection.server.send(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"[..]).await.unwrap();
//!
//!     // logs the exchange and writes /tmp/bodies/incomplete-index.html
//!     let summary = connection.finish().await;
//!     assert!(summary.pending.is_empty());
//! }
//! ```
//!
//! # Architecture
//!
//! - [`feed`]: bounded chunk channel between the producer and the decoders
//! - [`codec`]: incremental request and response decoders
//! - [`protocol`]: headers, frames and errors shared by everything else
//! - [`correlator`]: FIFO pairing of responses with requests
//! - [`persist`]: file naming, content decoding and writing of bodies
//! - [`connection`]: the two decode loops of one connection
//! - [`capture`]: opens connections and hands out their feeds
//! - [`observer`]: structured events for every exchange
//!
//! # Error Handling
//!
//! Nothing that shows up on the wire stops a connection:
//!
//! - [`protocol::ParseError`]: framing problems; the decoder skips ahead and
//!   carries on with the next message
//! - [`protocol::PersistError`]: a body that could not be written; only that
//!   body is lost
//! - [`feed::FeedClosed`]: the connection is gone, returned to the producer
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - A response to `HEAD` that carries `Content-Length` is read as if it had a
//!   body, since the decoder only ever sees one direction
//! - Maximum header size: 64KB
//! - Maximum number of headers: 128

pub mod capture;
pub mod codec;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod feed;
pub mod observer;
pub mod persist;
pub mod protocol;
pub mod sniff;

mod utils;
pub(crate) use utils::ensure;
