//! The three per-source-type capabilities the pipeline composes.
//!
//! A source type is supported once it has one implementation of each trait,
//! all declaring the same [`SourceType`]. The registry checks that at build
//! time; see [`crate::registry`].

use async_trait::async_trait;

use siphon_shared::{Enrichment, RawContent, Result, SourceIdentity, SourceType};

/// Recognizes and canonicalizes raw user input for one source type.
pub trait SourceParser: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Whether this type claims `input`. Must not fail or have side effects.
    fn recognize(&self, input: &str) -> bool;

    /// Derive the canonical identity of `input`.
    ///
    /// May stat and hash local files, never touches the network.
    fn canonicalize(&self, input: &str) -> Result<SourceIdentity>;
}

/// Pulls raw content for an identity.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn source_type(&self) -> SourceType;

    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent>;
}

/// Derives title, summary and tags from extracted content.
#[async_trait]
pub trait Enricher: Send + Sync {
    fn source_type(&self) -> SourceType;

    async fn enrich(&self, content: &RawContent) -> Result<Enrichment>;
}
