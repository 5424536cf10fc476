//! Entry point for the producer side.
//!
//! A [`Capture`] holds what all connections share: configuration and the
//! observer. [`Capture::open`] starts processing one connection and returns the
//! two [`ChunkSender`]s the producer pushes reassembled bytes into.
//!
//! ```no_run
//! use micro_reassembly::capture::Capture;
//! use micro_reassembly::config::CaptureConfig;
//!
//! # async fn demo() {
//! let capture = Capture::with_tracing(CaptureConfig::new().output_dir("/tmp/bodies"));
//! let mut connection = capture.open("10.0.0.1:51234-10.0.0.2:80");
//!
//! connection.client.send(&b"GET / HTTP/1.1\r\nHost: a\r\n\r\n"[..]).await.unwrap();
//! connection.server.send(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]).await.unwrap();
//!
//! let summary = connection.finish().await;
//! assert_eq!(summary.responses, 1);
//! # }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;

use crate::config::CaptureConfig;
use crate::connection::{ConnectionContext, ConnectionSummary};
use crate::feed::{ChunkSender, chunk_feed};
use crate::observer::{ExchangeObserver, TracingObserver};

#[derive(Clone)]
pub struct Capture {
    config: Arc<CaptureConfig>,
    observer: Arc<dyn ExchangeObserver>,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Capture {
    pub fn new(config: CaptureConfig, observer: Arc<dyn ExchangeObserver>) -> Self {
        Self { config: Arc::new(config), observer }
    }

    /// A capture that reports exchanges through `tracing`.
    pub fn with_tracing(config: CaptureConfig) -> Self {
        Self::new(config, Arc::new(TracingObserver))
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Starts decoding a new connection on the current tokio runtime.
    pub fn open(&self, label: impl Into<Arc<str>>) -> ConnectionHandle {
        let (client, client_reader) = chunk_feed(self.config.capacity());
        let (server, server_reader) = chunk_feed(self.config.capacity());

        let context = ConnectionContext::new(label, Arc::clone(&self.config), Arc::clone(&self.observer));
        let task = tokio::spawn(context.run(client_reader, server_reader));

        ConnectionHandle { client, server, task }
    }
}

/// Producer side of one open connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Bytes the client sent.
    pub client: ChunkSender,
    /// Bytes the server sent.
    pub server: ChunkSender,
    pub task: JoinHandle<ConnectionSummary>,
}

impl ConnectionHandle {
    /// Closes both directions and waits for the connection to drain.
    pub async fn finish(self) -> ConnectionSummary {
        self.client.close();
        self.server.close();
        self.task.await.unwrap_or_else(|e| {
            error!(cause = %e, "connection task failed");
            ConnectionSummary::default()
        })
    }
}
