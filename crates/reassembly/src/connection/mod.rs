//! Per-connection processing.
//!
//! A [`ConnectionContext`] drives the client and server directions of one
//! captured connection. Each direction is read by a [`MessageReader`], which
//! assembles whole messages out of codec frames and keeps going after framing
//! errors.

mod connection_context;
mod message_reader;

use std::fmt;

pub use connection_context::{ConnectionContext, ConnectionSummary};
pub use message_reader::{MessageError, MessageReader};

/// One of the two byte streams of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Requests, sent by the client.
    ClientToServer,
    /// Responses, sent by the server.
    ServerToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToServer => f.write_str("client->server"),
            Direction::ServerToClient => f.write_str("server->client"),
        }
    }
}
