//! The boundary between the byte producer and the decoders.
//!
//! The capture side owns a [`ChunkSender`] per direction and pushes reassembled
//! (and decrypted) bytes into it in order. The core owns the matching
//! [`ChunkReader`], which turns the chunks back into a sequential byte source.
//!
//! The channel is bounded: a producer that outruns decoding waits in
//! [`ChunkSender::send`]. A decoder that outruns the producer waits in
//! [`ChunkReader::read_into`] or `poll_read`. Closing or dropping the sender
//! ends the direction; the reader drains what is buffered and then reports
//! end-of-stream.

use std::cmp;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};

/// Creates the two halves of one direction's feed.
///
/// `capacity` bounds the number of chunks in flight.
pub fn chunk_feed(capacity: usize) -> (ChunkSender, ChunkReader) {
    let (sender, receiver) = mpsc::channel(capacity);
    (ChunkSender { sender }, ChunkReader { receiver, pending: Bytes::new(), closed: false })
}

/// The reader half is gone, nobody will consume further chunks.
#[derive(Debug, Error)]
#[error("chunk feed closed by the reader")]
pub struct FeedClosed {
    #[from]
    source: mpsc::SendError,
}

/// Producer half of a feed.
#[derive(Debug)]
pub struct ChunkSender {
    sender: mpsc::Sender<Bytes>,
}

impl ChunkSender {
    /// Hands the next chunk of this direction to the core.
    ///
    /// Waits while the channel is full.
    pub async fn send(&mut self, chunk: impl Into<Bytes>) -> Result<(), FeedClosed> {
        self.sender.send(chunk.into()).await?;
        Ok(())
    }

    /// Signals end-of-stream. Chunks already sent are still delivered.
    pub fn close(mut self) {
        self.sender.close_channel();
    }
}

/// Consumer half of a feed: a sequential, suspending byte source.
///
/// Holds at most one partially consumed chunk.
#[derive(Debug)]
pub struct ChunkReader {
    receiver: mpsc::Receiver<Bytes>,
    pending: Bytes,
    closed: bool,
}

impl ChunkReader {
    /// Reads up to `buf.len()` bytes.
    ///
    /// Suspends until a chunk is available or the feed has closed. Returns the
    /// number of bytes copied and whether the stream is done; `done` is only
    /// reported once every buffered byte has been handed out, and then `n` is
    /// zero. Bytes that did not fit are kept for the next call.
    pub async fn read_into(&mut self, buf: &mut [u8]) -> (usize, bool) {
        if !poll_fn(|cx| self.poll_fill(cx)).await {
            return (0, true);
        }

        let n = cmp::min(buf.len(), self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        (n, false)
    }

    /// True once the sender closed and all buffered bytes were consumed.
    pub fn is_done(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    /// Makes sure `pending` holds data.
    ///
    /// Resolves to `false` when the feed has closed and nothing is left.
    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        while self.pending.is_empty() {
            if self.closed {
                return Poll::Ready(false);
            }

            match self.receiver.poll_next_unpin(cx) {
                Poll::Ready(Some(chunk)) => self.pending = chunk,
                Poll::Ready(None) => self.closed = true,
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(true)
    }
}

impl AsyncRead for ChunkReader {
    /// Same contract as [`ChunkReader::read_into`]; filling nothing means
    /// end-of-stream.
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !ready!(this.poll_fill(cx)) {
            return Poll::Ready(Ok(()));
        }

        let n = cmp::min(buf.remaining(), this.pending.len());
        buf.put_slice(&this.pending[..n]);
        this.pending.advance(n);
        Poll::Ready(Ok(()))
    }
}
