//! Core domain types for the Siphon ingestion pipeline.
//!
//! Every source flows through the same four records: a [`SourceIdentity`]
//! (who is this?), [`RawContent`] (what does it say?), an [`Enrichment`]
//! (what is it about?), and the [`ProcessedRecord`] aggregate that is cached
//! under `identity.canonical_uri`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Extractor-specific metadata, kept in key order.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Current time as epoch seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

// ---------------------------------------------------------------------------
// SourceType
// ---------------------------------------------------------------------------

/// The closed set of source categories Siphon understands.
///
/// The canonical name is the scheme of every canonical URI of that type, so
/// it is persisted and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// Video platform URL (YouTube watch pages and short links).
    VideoPlatform,
    /// Cloud office document (Google Docs, Sheets, Slides, Forms).
    CloudDoc,
    /// Any other web page.
    Article,
    /// Local audio file.
    FileAudio,
    /// Local document or text file.
    FileDoc,
}

impl SourceType {
    /// All source types, in default registration order.
    pub const ALL: [SourceType; 5] = [
        Self::VideoPlatform,
        Self::CloudDoc,
        Self::Article,
        Self::FileAudio,
        Self::FileDoc,
    ];

    /// The canonical (URI scheme) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoPlatform => "video-platform",
            Self::CloudDoc => "cloud-doc",
            Self::Article => "article",
            Self::FileAudio => "file-audio",
            Self::FileDoc => "file-doc",
        }
    }

    /// Prefix shared by every canonical URI of this type (`"<type>:///"`).
    pub fn uri_prefix(&self) -> String {
        format!("{}:///", self.as_str())
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown source type '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Stage / Action
// ---------------------------------------------------------------------------

/// The four sequential pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Parse,
    Extract,
    Enrich,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse",
            Self::Extract => "extract",
            Self::Enrich => "enrich",
            Self::Assemble => "assemble",
        })
    }
}

/// The terminal action requested by a caller: the earliest point at which
/// the pipeline may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Parse,
    Extract,
    Enrich,
    /// Run every stage through assembly.
    #[default]
    Gulp,
}

impl Action {
    /// The last stage that runs for this action.
    pub fn terminal_stage(&self) -> Stage {
        match self {
            Self::Parse => Stage::Parse,
            Self::Extract => Stage::Extract,
            Self::Enrich => Stage::Enrich,
            Self::Gulp => Stage::Assemble,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parse" | "parser" => Ok(Self::Parse),
            "extract" | "extractor" => Ok(Self::Extract),
            "enrich" | "enricher" => Ok(Self::Enrich),
            "gulp" => Ok(Self::Gulp),
            other => Err(format!("invalid action '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage records
// ---------------------------------------------------------------------------

/// Canonical identity of a source, derived purely from the user's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub source_type: SourceType,
    /// Cache key: `"<source_type>:///<type-specific-path>"`.
    pub canonical_uri: String,
    /// The string exactly as the user supplied it.
    pub original_input: String,
    /// Content or URL digest, when the type has one.
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Raw extracted content for a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContent {
    pub source_type: SourceType,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RawContent {
    /// Content with empty metadata.
    pub fn new(source_type: SourceType, text: impl Into<String>) -> Self {
        Self {
            source_type,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Look up a string-valued metadata entry.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// AI-generated (or heuristic) enrichment for a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub source_type: SourceType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
}

impl Enrichment {
    /// An enrichment with every field empty.
    pub fn empty(source_type: SourceType) -> Self {
        Self {
            source_type,
            title: String::new(),
            description: String::new(),
            summary: String::new(),
            topics: Vec::new(),
            entities: Vec::new(),
        }
    }
}

/// The assembled aggregate, stored keyed by `identity.canonical_uri`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub identity: SourceIdentity,
    pub content: RawContent,
    pub enrichment: Enrichment,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Epoch seconds; set once on first creation.
    pub created_at: i64,
    /// Epoch seconds; refreshed on every write-through.
    pub updated_at: i64,
}

impl ProcessedRecord {
    /// Assemble a record stamped with the current time.
    pub fn assemble(identity: SourceIdentity, content: RawContent, enrichment: Enrichment) -> Self {
        let now = now_epoch();
        Self {
            identity,
            content,
            enrichment,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn uri(&self) -> &str {
        &self.identity.canonical_uri
    }

    pub fn title(&self) -> &str {
        &self.enrichment.title
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    pub fn summary(&self) -> &str {
        &self.enrichment.summary
    }

    /// Whether all three stage records agree on the source type.
    pub fn is_consistent(&self) -> bool {
        self.content.source_type == self.identity.source_type
            && self.enrichment.source_type == self.identity.source_type
    }
}

// ---------------------------------------------------------------------------
// PipelineOutput
// ---------------------------------------------------------------------------

/// Stage-appropriate result of a pipeline run; the variant follows the [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PipelineOutput {
    Identity(SourceIdentity),
    Content(RawContent),
    Enrichment(Enrichment),
    Record(ProcessedRecord),
}

impl PipelineOutput {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Identity(i) => i.source_type,
            Self::Content(c) => c.source_type,
            Self::Enrichment(e) => e.source_type,
            Self::Record(r) => r.identity.source_type,
        }
    }

    pub fn into_identity(self) -> Option<SourceIdentity> {
        match self {
            Self::Identity(i) => Some(i),
            _ => None,
        }
    }

    pub fn into_content(self) -> Option<RawContent> {
        match self {
            Self::Content(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_enrichment(self) -> Option<Enrichment> {
        match self {
            Self::Enrichment(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<ProcessedRecord> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SourceIdentity {
        SourceIdentity {
            source_type: SourceType::FileDoc,
            canonical_uri: "file-doc:///.pdf/0123456789abcdef".into(),
            original_input: "/tmp/report.pdf".into(),
            content_hash: Some("0123456789abcdef".into()),
        }
    }

    #[test]
    fn source_type_names_roundtrip() {
        for t in SourceType::ALL {
            let parsed: SourceType = t.as_str().parse().expect("parse source type");
            assert_eq!(parsed, t);
            let json = serde_json::to_string(&t).expect("serialize");
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
        assert!("youtube".parse::<SourceType>().is_err());
        assert_eq!(SourceType::Article.uri_prefix(), "article:///");
    }

    #[test]
    fn action_parsing() {
        assert_eq!("gulp".parse::<Action>(), Ok(Action::Gulp));
        assert_eq!("Extract".parse::<Action>(), Ok(Action::Extract));
        assert_eq!("parser".parse::<Action>(), Ok(Action::Parse));
        assert!("assemble".parse::<Action>().is_err());
        assert_eq!(Action::default(), Action::Gulp);
        assert_eq!(Action::Gulp.terminal_stage(), Stage::Assemble);
    }

    #[test]
    fn enrichment_defaults_to_empty_not_null() {
        let parsed: Enrichment =
            serde_json::from_str(r#"{"source_type":"article"}"#).expect("deserialize");
        assert_eq!(parsed, Enrichment::empty(SourceType::Article));
    }

    #[test]
    fn assembled_record_has_equal_timestamps() {
        let record = ProcessedRecord::assemble(
            identity(),
            RawContent::new(SourceType::FileDoc, "hello"),
            Enrichment::empty(SourceType::FileDoc),
        );
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.is_consistent());
        assert_eq!(record.uri(), "file-doc:///.pdf/0123456789abcdef");
        assert_eq!(record.text(), "hello");
    }

    #[test]
    fn pipeline_output_serialization() {
        let out = PipelineOutput::Identity(identity());
        let json = serde_json::to_value(&out).expect("serialize");
        assert_eq!(json["kind"], "identity");
        assert_eq!(json["value"]["source_type"], "file-doc");
        assert_eq!(out.source_type(), SourceType::FileDoc);
        assert!(out.into_record().is_none());
    }
}
