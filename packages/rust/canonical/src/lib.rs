//! Canonicalization algorithms for source identities.
//!
//! Every function here is deterministic: the same input produces the same
//! output in any process, which is what makes canonical URIs usable as cache
//! keys. Nothing in this crate touches the network; file fingerprints read
//! local bytes only.
//!
//! - [`web`]: web URL normalization and digesting
//! - [`file`]: streaming SHA-256 file fingerprints
//! - [`platform`]: video-platform and cloud-document identifier extraction

pub mod file;
pub mod platform;
pub mod web;

use std::path::PathBuf;

pub use file::{CHUNK_SIZE, FileFingerprint, HASH_PREFIX_LEN, file_extension, fingerprint_file};
pub use platform::{
    CloudDocKind, VIDEO_ID_LEN, cloud_doc_id, is_cloud_doc_host, is_cloud_doc_url,
    is_video_platform_host, is_video_platform_url, video_id,
};
pub use web::{TRACKING_PARAMS, TRACKING_PREFIXES, is_tracking_param, normalize_url, url_digest};

/// Why an input could not be canonicalized.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("no identifier found: {0}")]
    MissingId(String),

    #[error("not a regular file: {0:?}")]
    NotAFile(PathBuf),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Lowercase hex encoding of a digest.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
