//! Artifact file naming.
//!
//! A request identifier such as `/static/app.js?v=3` becomes
//! `<dir>/incomplete-app.js%3Fv%3D3`. Names are claimed with an exclusive
//! create, so two writers racing for the same name end up with distinct
//! files: the first gets the plain name, later ones `-0`, `-1` and so on.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;
use url::form_urlencoded;

use crate::protocol::PersistError;

pub const ARTIFACT_PREFIX: &str = "incomplete-";

/// Longest file name produced, truncation marker included.
pub const MAX_FILE_NAME: usize = 250;

/// Upper bound on `-N` suffixes tried for one name.
pub const MAX_COLLISION_PROBES: usize = 10_000;

pub const TRUNCATED_MARKER: &str = "...";
const NONAME: &str = "noname";

/// Last element of a slash separated path.
///
/// Trailing slashes are ignored. An empty input gives `"."` and an input made
/// only of slashes gives `"/"`.
pub fn base_name(label: &str) -> &str {
    if label.is_empty() {
        return ".";
    }

    let trimmed = label.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }

    match trimmed.rfind('/') {
        Some(at) => &trimmed[at + 1..],
        None => trimmed,
    }
}

/// Escaped, prefixed and length-capped file name for `label`.
pub fn artifact_name(label: &str) -> String {
    let escaped: String = form_urlencoded::byte_serialize(base_name(label).as_bytes()).collect();
    let mut name = format!("{ARTIFACT_PREFIX}{escaped}");

    // the escaped form is pure ascii, any byte index is a char boundary
    if name.len() > MAX_FILE_NAME {
        name.truncate(MAX_FILE_NAME - TRUNCATED_MARKER.len());
        name.push_str(TRUNCATED_MARKER);
    }
    name
}

/// Path the artifact for `label` would get if no file were in the way.
pub fn artifact_path(output_dir: &Path, label: &str) -> PathBuf {
    let path = output_dir.join(artifact_name(label));
    if path == output_dir { output_dir.join(NONAME) } else { path }
}

/// Claims a fresh file for `label` under `output_dir`.
///
/// Tries the plain name, then `-0`, `-1`, ... An existing file moves on to the
/// next suffix; any other error gives up.
pub fn create_unique(output_dir: &Path, label: &str) -> Result<(PathBuf, File), PersistError> {
    let base = artifact_path(output_dir, label);

    for probe in 0..=MAX_COLLISION_PROBES {
        let candidate = if probe == 0 { base.clone() } else { suffixed(&base, probe - 1) };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => {
                trace!(path = ?candidate, probe, "claimed artifact path");
                return Ok((candidate, file));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(PersistError::create(candidate, e)),
        }
    }

    Err(PersistError::Exhausted { base, probes: MAX_COLLISION_PROBES })
}

fn suffixed(base: &Path, n: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("-{n}"));
    PathBuf::from(name)
}
