use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::persist::coding::{ContentCoding, decoding_reader};
use crate::persist::naming;
use crate::protocol::PersistError;

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// A body written to disk. The file is never reused for another body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Bytes written after decoding.
    pub written: u64,
}

/// Outcome of one successful [`BodyPipeline::persist`].
///
/// A decoding failure does not fail the write: whatever was decoded before the
/// failure stays on disk and the failure is reported here.
#[derive(Debug)]
pub struct Persisted {
    pub artifact: Artifact,
    pub decode_error: Option<io::Error>,
}

/// Names, decodes and writes response bodies under one output directory.
#[derive(Debug, Clone)]
pub struct BodyPipeline {
    output_dir: Arc<Path>,
}

impl BodyPipeline {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: Arc::from(output_dir.into()) }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `body` to a fresh file named after `label`.
    ///
    /// `content_encoding` is the raw `Content-Encoding` value. Known codings are
    /// undone before writing; a value with an unknown coding is written as is.
    pub fn persist(&self, label: &str, body: &[u8], content_encoding: Option<&str>) -> Result<Persisted, PersistError> {
        let (path, mut file) = naming::create_unique(&self.output_dir, label)?;

        let codings = match content_encoding.map(ContentCoding::parse_list) {
            Some(Some(codings)) => {
                if !codings.is_empty() {
                    let undone: Vec<&str> = codings.iter().map(|coding| coding.name()).collect();
                    trace!(path = ?path, codings = ?undone, "undoing content-codings");
                }
                codings
            }
            Some(None) => {
                debug!(path = ?path, encoding = content_encoding, "unknown content-coding, writing raw body");
                Vec::new()
            }
            None => Vec::new(),
        };

        // an empty body has nothing to decode
        let reader: io::Result<Box<dyn Read + '_>> = if body.is_empty() { Ok(Box::new(body)) } else { decoding_reader(body, &codings) };

        let (written, decode_error) = match reader {
            Ok(mut reader) => copy_until_error(&mut reader, &mut file).map_err(|e| PersistError::write(&path, e))?,
            Err(e) => (0, Some(e)),
        };
        file.flush().map_err(|e| PersistError::write(&path, e))?;

        if let Some(e) = &decode_error {
            warn!(path = ?path, written, cause = %e, "body decoding stopped early");
        }

        Ok(Persisted { artifact: Artifact { path, written }, decode_error })
    }

    /// Runs [`persist`](Self::persist) on the blocking thread pool.
    pub async fn persist_blocking(&self, label: String, body: Bytes, content_encoding: Option<String>) -> Result<Persisted, PersistError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.persist(&label, &body, content_encoding.as_deref()))
            .await
            .map_err(PersistError::task)?
    }
}

/// Copies `reader` into `file` in fixed blocks.
///
/// Read errors end the copy and are returned alongside the byte count; write
/// errors are returned as the outer error.
fn copy_until_error(reader: &mut dyn Read, file: &mut File) -> io::Result<(u64, Option<io::Error>)> {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok((written, None)),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Ok((written, Some(e))),
        };
        file.write_all(&buf[..n])?;
        written += n as u64;
    }
}
