use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Framing errors raised while decoding one message.
///
/// All of them are recoverable: the decoder drops the offending bytes and
/// resumes at the next line.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid http status: {0:?}")]
    InvalidStatus(Option<u16>),

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("stream ended inside a message header, {remaining} bytes dropped")]
    Incomplete { remaining: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn incomplete(remaining: usize) -> Self {
        Self::Incomplete { remaining }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Failures while persisting a body.
///
/// Each one only skips persistence of the message it happened on.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("cannot create {path:?}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("no free name for {base:?} after {probes} probes")]
    Exhausted { base: PathBuf, probes: usize },

    #[error("persist task failed: {reason}")]
    Task { reason: String },
}

impl PersistError {
    pub fn create(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Create { path: path.into(), source }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write { path: path.into(), source }
    }

    pub fn task<S: ToString>(str: S) -> Self {
        Self::Task { reason: str.to_string() }
    }
}
