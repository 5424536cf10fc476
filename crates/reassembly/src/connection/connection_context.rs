use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::codec::header::{RequestHeaderDecoder, ResponseHeaderDecoder};
use crate::config::CaptureConfig;
use crate::connection::Direction;
use crate::connection::message_reader::MessageReader;
use crate::correlator::Correlator;
use crate::feed::ChunkReader;
use crate::observer::{ExchangeObserver, RequestEvent, ResponseEvent, hexdump};
use crate::persist::{Artifact, BodyPipeline};
use crate::protocol::{DecodedRequest, DecodedResponse};
use crate::sniff::sniff_content_type;

/// What one connection produced by the time both directions closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Requests decoded with their complete body.
    pub requests: usize,
    /// Final responses decoded with their complete body.
    pub responses: usize,
    /// Messages skipped because of a framing error, both directions.
    pub framing_errors: usize,
    /// Request identifiers that never got a response, oldest first.
    pub pending: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct LoopStats {
    messages: usize,
    errors: usize,
}

/// One captured connection: a request loop and a response loop sharing a
/// [`Correlator`].
///
/// Each loop owns one direction and ends when that direction closes; the
/// connection is done when both have.
pub struct ConnectionContext {
    label: Arc<str>,
    config: Arc<CaptureConfig>,
    observer: Arc<dyn ExchangeObserver>,
    correlator: Arc<Correlator>,
    pipeline: Option<BodyPipeline>,
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("label", &self.label)
            .field("config", &self.config)
            .field("correlator", &self.correlator)
            .finish_non_exhaustive()
    }
}

impl ConnectionContext {
    pub fn new(label: impl Into<Arc<str>>, config: Arc<CaptureConfig>, observer: Arc<dyn ExchangeObserver>) -> Self {
        let pipeline = config.persistence_dir().map(BodyPipeline::new);
        Self { label: label.into(), config, observer, correlator: Arc::new(Correlator::new()), pipeline }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Decodes both directions to completion.
    ///
    /// The two loops run as separate tasks and only meet at the correlator.
    pub async fn run(self, client: ChunkReader, server: ChunkReader) -> ConnectionSummary {
        let context = Arc::new(self);
        debug!(conn = %context.label, "connection attached");

        let request_loop = tokio::spawn({
            let context = Arc::clone(&context);
            async move { context.process_requests(client).await }
        });
        let response_loop = tokio::spawn({
            let context = Arc::clone(&context);
            async move { context.process_responses(server).await }
        });

        let (requests, responses) = tokio::join!(request_loop, response_loop);
        let requests = context.loop_outcome(Direction::ClientToServer, requests);
        let responses = context.loop_outcome(Direction::ServerToClient, responses);

        let pending = context.correlator.pending();
        if !pending.is_empty() {
            debug!(conn = %context.label, pending = pending.len(), "requests left without a response");
        }
        debug!(conn = %context.label, requests = requests.messages, responses = responses.messages, "connection finished");

        ConnectionSummary {
            requests: requests.messages,
            responses: responses.messages,
            framing_errors: requests.errors + responses.errors,
            pending,
        }
    }

    fn loop_outcome(&self, direction: Direction, joined: Result<LoopStats, tokio::task::JoinError>) -> LoopStats {
        joined.unwrap_or_else(|e| {
            error!(conn = %self.label, %direction, cause = %e, "decode loop aborted");
            LoopStats::default()
        })
    }

    async fn process_requests(&self, reader: ChunkReader) -> LoopStats {
        let mut messages = MessageReader::<_, RequestHeaderDecoder>::new(reader);
        let mut stats = LoopStats::default();

        while let Some(result) = messages.next_message().await {
            match result {
                Ok(request) => {
                    stats.messages += 1;
                    self.on_request(&request);
                }
                Err(e) => {
                    stats.errors += 1;
                    match e.header {
                        // the request is on the wire even though its body is lost
                        Some(header) => {
                            let url = header.target();
                            warn!(conn = %self.label, url, cause = %e.source, "malformed request body");
                            self.correlator.push(url);
                        }
                        None => warn!(conn = %self.label, cause = %e.source, "skipping malformed request"),
                    }
                }
            }
        }

        debug!(conn = %self.label, direction = %Direction::ClientToServer, messages = stats.messages, "stream closed");
        stats
    }

    async fn process_responses(&self, reader: ChunkReader) -> LoopStats {
        let mut messages = MessageReader::<_, ResponseHeaderDecoder>::new(reader);
        let mut stats = LoopStats::default();

        while let Some(result) = messages.next_message().await {
            match result {
                Ok(response) if response.header().is_interim() => {
                    debug!(conn = %self.label, status = %response.header().status_line(), "interim response");
                }
                Ok(response) => {
                    stats.messages += 1;
                    self.on_response(response).await;
                }
                Err(e) => {
                    stats.errors += 1;
                    match e.header {
                        Some(header) if !header.is_interim() => {
                            let url = self.correlator.pop();
                            warn!(conn = %self.label, url = %url, status = %header.status_line(), cause = %e.source, "malformed response body");
                        }
                        _ => warn!(conn = %self.label, cause = %e.source, "skipping malformed response"),
                    }
                }
            }
        }

        debug!(conn = %self.label, direction = %Direction::ServerToClient, messages = stats.messages, "stream closed");
        stats
    }

    fn on_request(&self, request: &DecodedRequest) {
        let header = request.header();
        let url = header.target().to_owned();
        self.correlator.push(url.clone());
        self.dump_body(Direction::ClientToServer, request.body());

        self.observer.on_request(&RequestEvent {
            connection: Arc::clone(&self.label),
            method: header.method().clone(),
            url,
            body_len: request.body().len(),
        });
    }

    async fn on_response(&self, response: DecodedResponse) {
        let url = self.correlator.pop();
        let declared_length = response.declared_length();
        let length_matches = response.length_matches();
        let (header, body) = response.into_parts();

        if !length_matches {
            warn!(conn = %self.label, url = %url, declared = ?declared_length, observed = body.len(), "content-length mismatch");
        }
        self.dump_body(Direction::ServerToClient, &body);

        let content_type = header.content_type().map_or_else(|| sniff_content_type(&body).to_owned(), str::to_owned);
        let content_encoding = header.content_encoding().map(str::to_owned);
        let observed_length = body.len();

        let artifact = match &self.pipeline {
            Some(pipeline) => self.persist(pipeline, &url, body, content_encoding.clone()).await,
            None => None,
        };

        self.observer.on_response(&ResponseEvent {
            connection: Arc::clone(&self.label),
            status: header.status_line(),
            url,
            declared_length,
            observed_length,
            length_matches,
            content_type,
            content_encoding,
            artifact,
        });
    }

    async fn persist(&self, pipeline: &BodyPipeline, url: &str, body: Bytes, content_encoding: Option<String>) -> Option<Artifact> {
        match pipeline.persist_blocking(url.to_owned(), body, content_encoding).await {
            Ok(persisted) => {
                info!(conn = %self.label, path = ?persisted.artifact.path, written = persisted.artifact.written, "saved body");
                Some(persisted.artifact)
            }
            Err(e) => {
                error!(conn = %self.label, url = %url, cause = %e, "failed to save body");
                None
            }
        }
    }

    fn dump_body(&self, direction: Direction, body: &[u8]) {
        if self.config.hexdump_enabled() && !body.is_empty() {
            info!(conn = %self.label, %direction, body_len = body.len(), "body hex\n{}", hexdump(body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::NO_REQUEST_SEEN;
    use crate::feed::chunk_feed;
    use crate::observer::MockExchangeObserver;
    use std::time::Duration;

    /// Feeds the client side first and waits for `pushes` identifiers so the
    /// pairing does not depend on task scheduling.
    async fn run_with(observer: MockExchangeObserver, client: &'static [u8], pushes: usize, server: &'static [u8]) -> ConnectionSummary {
        run_configured(CaptureConfig::default(), observer, client, pushes, server).await
    }

    async fn run_configured(
        config: CaptureConfig,
        observer: MockExchangeObserver,
        client: &'static [u8],
        pushes: usize,
        server: &'static [u8],
    ) -> ConnectionSummary {
        let context = ConnectionContext::new("test", Arc::new(config), Arc::new(observer));
        let correlator = Arc::clone(context.correlator());
        let (mut client_tx, client_rx) = chunk_feed(8);
        let (mut server_tx, server_rx) = chunk_feed(8);

        let running = tokio::spawn(context.run(client_rx, server_rx));
        client_tx.send(client).await.unwrap();
        client_tx.close();
        tokio::time::timeout(Duration::from_secs(5), async {
            while correlator.len() < pushes {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        server_tx.send(server).await.unwrap();
        server_tx.close();
        running.await.unwrap()
    }

    #[tokio::test]
    async fn pairs_request_and_response() {
        let mut observer = MockExchangeObserver::new();
        observer.expect_on_request().withf(|event| event.url == "/a" && event.method == http::Method::GET).times(1).return_const(());
        observer
            .expect_on_response()
            .withf(|event| event.status == "200 OK" && event.content_type == "text/plain; charset=utf-8" && event.artifact.is_none())
            .times(1)
            .return_const(());

        let summary = run_with(observer, b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n", 1, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
        assert_eq!(summary.requests, 1);
        assert_eq!(summary.responses, 1);
    }

    #[tokio::test]
    async fn interim_responses_are_not_paired() {
        let mut observer = MockExchangeObserver::new();
        observer.expect_on_request().times(1).return_const(());
        observer.expect_on_response().withf(|event| event.url == "/upload" && event.status == "201 Created").times(1).return_const(());

        let summary = run_with(
            observer,
            b"POST /upload HTTP/1.1\r\nContent-Length: 1\r\n\r\nx",
            1,
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        assert_eq!(summary.responses, 1);
        assert!(summary.pending.is_empty());
    }

    #[tokio::test]
    async fn unmatched_response_gets_sentinel() {
        let mut observer = MockExchangeObserver::new();
        observer.expect_on_request().never();
        observer.expect_on_response().withf(|event| event.url == NO_REQUEST_SEEN).times(1).return_const(());

        run_with(observer, b"", 0, b"HTTP/1.1 204 No Content\r\n\r\n").await;
    }

    #[tokio::test]
    async fn broken_request_body_still_pairs() {
        let mut observer = MockExchangeObserver::new();
        observer.expect_on_request().withf(|event| event.url == "/next").times(1).return_const(());
        observer.expect_on_response().withf(|event| event.url == "/up").times(1).return_const(());

        let summary = run_with(
            observer,
            b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nnot-hex\r\nGET /next HTTP/1.1\r\n\r\n",
            2,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        assert_eq!(summary.framing_errors, 1);
        assert_eq!(summary.requests, 1);
        assert_eq!(summary.pending, vec!["/next".to_owned()]);
    }

    #[tokio::test]
    async fn target_with_unescaped_quotes_still_pairs() {
        let mut observer = MockExchangeObserver::new();
        observer.expect_on_request().withf(|event| event.url == r#"/api?q="x""# && event.body_len == 4).times(1).return_const(());
        observer.expect_on_request().withf(|event| event.url == "/b").times(1).return_const(());
        observer.expect_on_response().withf(|event| event.status == "201 Created" && event.url == r#"/api?q="x""#).times(1).return_const(());
        observer.expect_on_response().withf(|event| event.status == "200 OK" && event.url == "/b").times(1).return_const(());

        let summary = run_with(
            observer,
            b"POST /api?q=\"x\" HTTP/1.1\r\nContent-Length: 4\r\n\r\nbodyGET /b HTTP/1.1\r\n\r\n",
            2,
            b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.responses, 2);
        assert_eq!(summary.framing_errors, 0);
        assert!(summary.pending.is_empty());
    }

    #[tokio::test]
    async fn unwritable_output_dir_only_skips_persistence() {
        let missing = std::env::temp_dir().join(format!("micro-reassembly-missing-{}", std::process::id())).join("nested");
        let config = CaptureConfig::new().output_dir(missing);

        let mut observer = MockExchangeObserver::new();
        observer.expect_on_request().times(2).return_const(());
        observer.expect_on_response().withf(|event| event.url == "/one" && event.artifact.is_none()).times(1).return_const(());
        observer.expect_on_response().withf(|event| event.url == "/two" && event.artifact.is_none()).times(1).return_const(());

        let summary = run_configured(
            config,
            observer,
            b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n",
            2,
            b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\noneHTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\ntwo",
        )
        .await;
        assert_eq!(summary.responses, 2);
        assert_eq!(summary.framing_errors, 0);
        assert!(summary.pending.is_empty());
    }
}
