//! Streaming file fingerprints.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::{CanonicalError, to_hex};

/// Read buffer size used while hashing.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of hex characters of the digest carried in file URIs.
pub const HASH_PREFIX_LEN: usize = 16;

/// Identity-relevant facts about a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Lowercase extension including the dot, or empty.
    pub extension: String,
    /// Full SHA-256 hex digest of the file bytes.
    pub digest: String,
    pub size: u64,
}

impl FileFingerprint {
    /// The short digest prefix used in canonical URIs.
    pub fn prefix(&self) -> &str {
        &self.digest[..HASH_PREFIX_LEN]
    }
}

/// Lowercase dotted extension of `path` (`"report.PDF"` -> `".pdf"`).
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Hash a file in fixed-size chunks so memory stays bounded.
pub fn fingerprint_file(path: &Path) -> Result<FileFingerprint, CanonicalError> {
    let io_err = |source| CanonicalError::Io {
        path: path.to_path_buf(),
        source,
    };

    let meta = std::fs::metadata(path).map_err(io_err)?;
    if !meta.is_file() {
        return Err(CanonicalError::NotAFile(path.to_path_buf()));
    }
    let absolute = std::fs::canonicalize(path).map_err(io_err)?;

    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(FileFingerprint {
        path: absolute,
        extension: file_extension(path).unwrap_or_default(),
        digest: to_hex(&hasher.finalize()),
        size: meta.len(),
    })
}
