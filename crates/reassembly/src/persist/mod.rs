//! Response body persistence.
//!
//! [`BodyPipeline`] turns a decoded body into an [`Artifact`]: it claims a
//! collision-free path (see [`naming`]), undoes the declared content-coding
//! (see [`ContentCoding`]) and streams the result to disk.

mod coding;
pub mod naming;
mod pipeline;

pub use coding::{ContentCoding, decoding_reader};
pub use pipeline::{Artifact, BodyPipeline, Persisted};
