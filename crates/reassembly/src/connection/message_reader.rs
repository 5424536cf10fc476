use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::MessageDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{DecodedMessage, Message, ParseError, PayloadItem, PayloadSize};

const INITIAL_BUFFER_SIZE: usize = 8 * 1024;

/// A message that could not be decoded.
///
/// `header` is set when the header section decoded and the failure happened
/// in the body.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct MessageError<H> {
    pub header: Option<H>,
    #[source]
    pub source: ParseError,
}

/// Pulls whole messages out of one direction.
///
/// Works like `tokio_util::codec::FramedRead`, except that a decoding error
/// does not end the stream: the decoder has already skipped the bad bytes and
/// the next call carries on with what follows.
#[derive(Debug)]
pub struct MessageReader<R, D> {
    reader: R,
    decoder: MessageDecoder<D>,
    buffer: BytesMut,
    eof: bool,
}

impl<R, D> MessageReader<R, D>
where
    R: AsyncRead + Unpin,
    D: HeaderDecoder + Default,
{
    pub fn new(reader: R) -> Self {
        Self { reader, decoder: MessageDecoder::new(), buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE), eof: false }
    }

    /// Reads the next message with its complete body.
    ///
    /// Returns `None` once the direction has closed and nothing is left.
    pub async fn next_message(&mut self) -> Option<Result<DecodedMessage<D::Header>, MessageError<D::Header>>> {
        let (header, payload_size) = loop {
            match self.next_frame().await? {
                Ok(Message::Header(header)) => break header,
                Ok(Message::Payload(item)) => trace!(?item, "payload frame outside of a message"),
                Err(source) => return Some(Err(MessageError { header: None, source })),
            }
        };

        Some(self.read_body(header, payload_size).await)
    }

    async fn read_body(&mut self, header: D::Header, payload_size: PayloadSize) -> Result<DecodedMessage<D::Header>, MessageError<D::Header>> {
        let mut body = BytesMut::new();

        loop {
            match self.next_frame().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(chunk)))) => body.extend_from_slice(&chunk),
                Some(Ok(Message::Payload(PayloadItem::Eof))) | None => break,
                Some(Ok(Message::Header(_))) => {
                    return Err(MessageError { header: Some(header), source: ParseError::invalid_body("header frame inside a body") });
                }
                Some(Err(source)) => return Err(MessageError { header: Some(header), source }),
            }
        }

        Ok(DecodedMessage::new(header, payload_size, body.freeze()))
    }

    async fn next_frame(&mut self) -> Option<Result<Message<(D::Header, PayloadSize)>, ParseError>> {
        loop {
            if self.eof {
                return self.decoder.decode_eof(&mut self.buffer).transpose();
            }

            if let Some(frame) = self.decoder.decode(&mut self.buffer).transpose() {
                return Some(frame);
            }

            match self.reader.read_buf(&mut self.buffer).await {
                Ok(0) => self.eof = true,
                Ok(n) => trace!(read = n, buffered = self.buffer.len(), "filled receive buffer"),
                Err(e) => {
                    self.eof = true;
                    return Some(Err(ParseError::io(e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::header::{RequestHeaderDecoder, ResponseHeaderDecoder};
    use crate::feed::chunk_feed;
    use indoc::indoc;

    fn request_reader(bytes: &'static [u8]) -> MessageReader<&'static [u8], RequestHeaderDecoder> {
        MessageReader::new(bytes)
    }

    #[tokio::test]
    async fn pipelined_requests() {
        let mut reader = request_reader(
            indoc! {r##"
            GET /a HTTP/1.1
            Host: x

            POST /b HTTP/1.1
            Host: x
            Content-Length: 5

            helloGET /c HTTP/1.1
            Host: x

            "##}
            .as_bytes(),
        );

        let first = reader.next_message().await.unwrap().unwrap();
        assert_eq!(first.header().target(), "/a");
        assert!(first.body().is_empty());

        let second = reader.next_message().await.unwrap().unwrap();
        assert_eq!(second.header().target(), "/b");
        assert_eq!(&second.body()[..], b"hello");

        let third = reader.next_message().await.unwrap().unwrap();
        assert_eq!(third.header().target(), "/c");

        assert!(reader.next_message().await.is_none());
    }

    #[tokio::test]
    async fn recovers_after_malformed_request() {
        let mut reader = request_reader(b"GARBAGE\r\nGET /ok HTTP/1.1\r\nHost: x\r\n\r\n");

        let error = reader.next_message().await.unwrap().unwrap_err();
        assert!(error.header.is_none());

        let request = reader.next_message().await.unwrap().unwrap();
        assert_eq!(request.header().target(), "/ok");
        assert!(reader.next_message().await.is_none());
    }

    #[tokio::test]
    async fn body_error_keeps_header() {
        let mut reader: MessageReader<_, ResponseHeaderDecoder> =
            MessageReader::new(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nxyz\r\n"[..]);

        let error = reader.next_message().await.unwrap().unwrap_err();
        assert_eq!(error.header.map(|header| header.status().as_u16()), Some(200));
    }

    #[tokio::test]
    async fn chunked_body_split_across_feed_chunks() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Trailer: t\r\n\r\n";
        let (mut sender, feed) = chunk_feed(4);

        let producer = tokio::spawn(async move {
            for piece in wire.chunks(3) {
                sender.send(piece.to_vec()).await.unwrap();
            }
            sender.close();
        });

        let mut reader: MessageReader<_, ResponseHeaderDecoder> = MessageReader::new(feed);
        let response = reader.next_message().await.unwrap().unwrap();
        assert_eq!(&response.body()[..], b"hello world");
        assert!(reader.next_message().await.is_none());
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn until_close_body_ends_with_stream() {
        let mut reader: MessageReader<_, ResponseHeaderDecoder> = MessageReader::new(&b"HTTP/1.0 200 OK\r\n\r\nstreamed until close"[..]);

        let response = reader.next_message().await.unwrap().unwrap();
        assert_eq!(response.payload_size(), PayloadSize::UntilClose);
        assert_eq!(&response.body()[..], b"streamed until close");
        assert!(reader.next_message().await.is_none());
    }

    #[tokio::test]
    async fn truncated_header_at_close() {
        let mut reader = request_reader(b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTT");

        assert!(reader.next_message().await.unwrap().is_ok());
        let error = reader.next_message().await.unwrap().unwrap_err();
        assert!(matches!(error.source, ParseError::Incomplete { remaining: 10 }));
        assert!(reader.next_message().await.is_none());
    }
}
