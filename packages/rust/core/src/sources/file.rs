//! Local file sources: recognition by extension, identity by content hash.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use siphon_canonical::{file_extension, fingerprint_file};
use siphon_shared::file_types::{is_audio, is_document, mime_type};
use siphon_shared::{Metadata, Result, SiphonError, SourceIdentity, SourceType};

use crate::strategy::SourceParser;

/// Parser for existing local files whose extension belongs to one source type.
pub struct FileParser {
    source_type: SourceType,
    accepts: fn(&str) -> bool,
}

impl FileParser {
    /// Audio files (`file-audio`).
    pub fn audio() -> Self {
        Self {
            source_type: SourceType::FileAudio,
            accepts: is_audio,
        }
    }

    /// Document and text files (`file-doc`).
    pub fn documents() -> Self {
        Self {
            source_type: SourceType::FileDoc,
            accepts: is_document,
        }
    }
}

impl SourceParser for FileParser {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn recognize(&self, input: &str) -> bool {
        let path = Path::new(input.trim());
        path.is_file() && file_extension(path).is_some_and(|ext| (self.accepts)(&ext))
    }

    fn canonicalize(&self, input: &str) -> Result<SourceIdentity> {
        let path = Path::new(input.trim());
        let fail = |msg: String| SiphonError::canonicalization(self.source_type, input, msg);

        let fingerprint = fingerprint_file(path).map_err(|e| fail(e.to_string()))?;
        if !(self.accepts)(&fingerprint.extension) {
            return Err(fail(format!(
                "extension '{}' is not a {} format",
                fingerprint.extension, self.source_type
            )));
        }

        Ok(SourceIdentity {
            source_type: self.source_type,
            canonical_uri: format!(
                "{}{}/{}",
                self.source_type.uri_prefix(),
                fingerprint.extension,
                fingerprint.prefix()
            ),
            original_input: input.to_string(),
            content_hash: Some(fingerprint.digest),
        })
    }
}

fn rfc3339(time: std::io::Result<SystemTime>) -> serde_json::Value {
    time.ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .into()
}

/// Filesystem metadata recorded for every file source.
pub(crate) fn file_metadata(path: &Path, identity: &SourceIdentity) -> Result<Metadata> {
    let stat = std::fs::metadata(path).map_err(|e| SiphonError::io(path, e))?;
    let extension = file_extension(path).unwrap_or_default();

    let mut meta = Metadata::new();
    meta.insert(
        "file_name".into(),
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .into(),
    );
    meta.insert("extension".into(), extension.clone().into());
    meta.insert("mime_type".into(), mime_type(&extension).into());
    meta.insert("file_size".into(), stat.len().into());
    meta.insert("created_at".into(), rfc3339(stat.created()));
    meta.insert("last_modified".into(), rfc3339(stat.modified()));
    meta.insert("hash".into(), identity.content_hash.clone().into());
    Ok(meta)
}
