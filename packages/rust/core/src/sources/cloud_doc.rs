//! Cloud office documents, read through their public export endpoints.

use async_trait::async_trait;
use tracing::{info, instrument};
use url::Url;

use siphon_canonical::{CloudDocKind, cloud_doc_id, is_cloud_doc_url};
use siphon_fetch::Fetcher;
use siphon_shared::{RawContent, Result, SiphonError, SourceIdentity, SourceType};

use crate::strategy::{Extractor, SourceParser};

const CLOUD_DOC_ORIGIN: &str = "https://docs.google.com";

/// Recognizes cloud-document URLs; family plus document ID is the identity.
pub struct CloudDocParser;

impl SourceParser for CloudDocParser {
    fn source_type(&self) -> SourceType {
        SourceType::CloudDoc
    }

    fn recognize(&self, input: &str) -> bool {
        is_cloud_doc_url(input)
    }

    fn canonicalize(&self, input: &str) -> Result<SourceIdentity> {
        let (kind, id) = cloud_doc_id(input).map_err(|e| {
            SiphonError::canonicalization(SourceType::CloudDoc, input, e.to_string())
        })?;
        Ok(SourceIdentity {
            source_type: SourceType::CloudDoc,
            canonical_uri: format!(
                "{}{}/{id}",
                SourceType::CloudDoc.uri_prefix(),
                kind.uri_segment()
            ),
            original_input: input.to_string(),
            content_hash: None,
        })
    }
}

/// Split `cloud-doc:///<family>/<id>` back into its parts.
fn parse_uri(uri: &str) -> Option<(CloudDocKind, &str)> {
    let rest = uri.strip_prefix(&SourceType::CloudDoc.uri_prefix())?;
    let (segment, id) = rest.split_once('/')?;
    let kind = CloudDocKind::from_uri_segment(segment)?;
    (!id.is_empty()).then_some((kind, id))
}

/// Export path and format for a document family; forms have no text export.
fn export_path(kind: CloudDocKind, id: &str) -> Option<(String, &'static str)> {
    match kind {
        CloudDocKind::Document => Some((format!("/document/d/{id}/export?format=txt"), "txt")),
        CloudDocKind::Spreadsheet => {
            Some((format!("/spreadsheets/d/{id}/export?format=csv"), "csv"))
        }
        CloudDocKind::Presentation => Some((format!("/presentation/d/{id}/export/txt"), "txt")),
        CloudDocKind::Form => None,
    }
}

/// Extractor for `cloud-doc` sources. Only publicly shared documents export.
pub struct CloudDocExtractor {
    fetcher: Fetcher,
    origin: String,
}

impl CloudDocExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            origin: CLOUD_DOC_ORIGIN.into(),
        }
    }

    /// Export from a different origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Extractor for CloudDocExtractor {
    fn source_type(&self) -> SourceType {
        SourceType::CloudDoc
    }

    #[instrument(skip_all, fields(uri = %identity.canonical_uri))]
    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent> {
        let uri = &identity.canonical_uri;
        let (kind, id) = parse_uri(uri)
            .ok_or_else(|| SiphonError::extraction(uri, "malformed cloud document URI"))?;
        let (path, format) = export_path(kind, id).ok_or_else(|| {
            SiphonError::extraction(uri, format!("{} have no text export", kind.path_segment()))
        })?;

        let export_url = Url::parse(&format!("{}{path}", self.origin))
            .map_err(|e| SiphonError::extraction(uri, format!("invalid export URL: {e}")))?;
        info!(%export_url, "exporting cloud document");
        let page = self.fetcher.fetch(&export_url).await?;

        // A private document redirects to a sign-in page instead of exporting.
        if page.content_type.as_deref().is_some_and(|ct| ct.contains("text/html")) {
            return Err(SiphonError::extraction(
                uri,
                "document is not publicly shared (export returned HTML)",
            ));
        }
        if page.body.trim().is_empty() {
            return Err(SiphonError::extraction(uri, "document export is empty"));
        }

        let mut content = RawContent::new(SourceType::CloudDoc, page.body);
        let meta = &mut content.metadata;
        meta.insert("document_id".into(), id.into());
        meta.insert("kind".into(), kind.uri_segment().into());
        meta.insert(
            "source_url".into(),
            format!("{CLOUD_DOC_ORIGIN}/{}/d/{id}", kind.path_segment()).into(),
        );
        meta.insert("export_url".into(), export_url.to_string().into());
        meta.insert("export_format".into(), format.into());
        meta.insert("content_type".into(), page.content_type.into());
        Ok(content)
    }
}
