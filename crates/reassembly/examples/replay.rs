//! Replays two recorded direction dumps as one connection.
//!
//! ```text
//! cargo run --example replay -- client.bin server.bin [output-dir]
//! ```

use std::path::PathBuf;

use micro_reassembly::capture::Capture;
use micro_reassembly::config::CaptureConfig;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Size of the pieces the dumps are cut into, roughly one TCP segment.
const SEGMENT_SIZE: usize = 1460;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut args = std::env::args().skip(1);
    let (Some(client_path), Some(server_path)) = (args.next(), args.next()) else {
        error!("usage: replay <client-dump> <server-dump> [output-dir]");
        return;
    };
    let output_dir = args.next().map(PathBuf::from).unwrap_or_default();

    let (client_bytes, server_bytes) = match (tokio::fs::read(&client_path).await, tokio::fs::read(&server_path).await) {
        (Ok(client), Ok(server)) => (client, server),
        (Err(e), _) | (_, Err(e)) => {
            error!(cause = %e, "cannot read dumps");
            return;
        }
    };

    let capture = Capture::with_tracing(CaptureConfig::new().output_dir(output_dir).hexdump(false));
    let connection = capture.open(format!("{client_path} <-> {server_path}"));
    let (mut client, mut server, task) = (connection.client, connection.server, connection.task);

    let feed_client = async move {
        for segment in client_bytes.chunks(SEGMENT_SIZE) {
            if client.send(segment.to_vec()).await.is_err() {
                break;
            }
        }
        client.close();
    };
    let feed_server = async move {
        for segment in server_bytes.chunks(SEGMENT_SIZE) {
            if server.send(segment.to_vec()).await.is_err() {
                break;
            }
        }
        server.close();
    };
    tokio::join!(feed_client, feed_server);

    match task.await {
        Ok(summary) => info!(
            requests = summary.requests,
            responses = summary.responses,
            framing_errors = summary.framing_errors,
            pending = ?summary.pending,
            "replay finished"
        ),
        Err(e) => error!(cause = %e, "connection task failed"),
    }
}
