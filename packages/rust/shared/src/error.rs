//! Error types for Siphon.
//!
//! Library crates use [`SiphonError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::{SourceType, Stage};

/// Top-level error type for all Siphon operations.
#[derive(Debug, thiserror::Error)]
pub enum SiphonError {
    /// No registered source type claims the input.
    #[error("no handler recognizes source: {input}")]
    Recognition { input: String },

    /// The input matched a source type but lacks the structure that type requires.
    #[error("cannot canonicalize {source_type} source '{input}': {message}")]
    Canonicalization {
        source_type: SourceType,
        input: String,
        message: String,
    },

    /// The extract stage failed for a known identity.
    #[error("extraction failed for {uri}: {message}")]
    Extraction { uri: String, message: String },

    /// The enrich stage failed for a known identity.
    #[error("enrichment failed for {uri}: {message}")]
    Enrichment { uri: String, message: String },

    /// The strategy registry failed startup validation.
    #[error("registry validation failed: {}", problems.join("; "))]
    RegistryValidation { problems: Vec<String> },

    /// A lookup addressed a source type with no registered strategies.
    #[error("no strategies registered for source type {source_type}")]
    Unregistered { source_type: SourceType },

    /// A stage exceeded the per-request deadline.
    #[error("{stage} stage timed out after {secs}s for {uri}")]
    Timeout {
        stage: Stage,
        uri: String,
        secs: u64,
    },

    /// Database or repository error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error.
    #[error("network error: {0}")]
    Network(String),

    /// HTML-to-Markdown or document-to-text conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiphonError>;

/// Coarse failure category, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Recognition,
    Canonicalization,
    Extraction,
    Enrichment,
    RegistryValidation,
    Timeout,
    Storage,
    Other,
}

impl SiphonError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a canonicalization error for `input`.
    pub fn canonicalization(
        source_type: SourceType,
        input: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Canonicalization {
            source_type,
            input: input.into(),
            message: msg.into(),
        }
    }

    /// Create an extraction error for the identity at `uri`.
    pub fn extraction(uri: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            uri: uri.into(),
            message: msg.into(),
        }
    }

    /// Create an enrichment error for the identity at `uri`.
    pub fn enrichment(uri: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Enrichment {
            uri: uri.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach stage context to a failure raised inside the extract or enrich stage.
    ///
    /// Errors already tagged for a stage, timeouts, and storage errors pass through.
    pub fn in_stage(self, stage: Stage, uri: &str) -> Self {
        match (stage, self) {
            (_, e @ (Self::Extraction { .. } | Self::Enrichment { .. })) => e,
            (_, e @ (Self::Timeout { .. } | Self::Storage(_))) => e,
            (Stage::Extract, e) => Self::extraction(uri, e.to_string()),
            (Stage::Enrich, e) => Self::enrichment(uri, e.to_string()),
            (_, e) => e,
        }
    }

    /// The coarse category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Recognition { .. } => FailureKind::Recognition,
            Self::Canonicalization { .. } => FailureKind::Canonicalization,
            Self::Extraction { .. } => FailureKind::Extraction,
            Self::Enrichment { .. } => FailureKind::Enrichment,
            Self::RegistryValidation { .. } => FailureKind::RegistryValidation,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Storage(_) => FailureKind::Storage,
            _ => FailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SiphonError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = SiphonError::Recognition {
            input: "not a path and not a url".into(),
        };
        assert!(err.to_string().contains("not a path and not a url"));

        let err = SiphonError::RegistryValidation {
            problems: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "registry validation failed: a; b");
    }

    #[test]
    fn in_stage_attaches_identity() {
        let err = SiphonError::Network("connection reset".into())
            .in_stage(Stage::Extract, "article:///sha256/abc");
        assert_eq!(err.kind(), FailureKind::Extraction);
        assert!(err.to_string().contains("article:///sha256/abc"));
        assert!(err.to_string().contains("connection reset"));

        let err = SiphonError::Conversion("bad json".into()).in_stage(Stage::Enrich, "u");
        assert_eq!(err.kind(), FailureKind::Enrichment);
    }

    #[test]
    fn in_stage_keeps_storage_and_tagged_errors() {
        let err = SiphonError::Storage("disk full".into()).in_stage(Stage::Extract, "u");
        assert_eq!(err.kind(), FailureKind::Storage);

        let err = SiphonError::extraction("first", "boom").in_stage(Stage::Enrich, "second");
        match err {
            SiphonError::Extraction { uri, .. } => assert_eq!(uri, "first"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
