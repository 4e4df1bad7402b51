//! Web articles: any http(s) page not claimed by a more specific source.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use siphon_canonical::{is_cloud_doc_url, is_video_platform_url, normalize_url, url_digest};
use siphon_fetch::readability::paragraph_count;
use siphon_fetch::{Fetcher, extract_readable};
use siphon_markdown::{ConvertOptions, word_count};
use siphon_shared::{RawContent, Result, SiphonError, SourceIdentity, SourceType};

use crate::strategy::{Extractor, SourceParser};

/// Hosts that belong to the cloud-document family but expose no export.
const CLOUD_STORAGE_HOSTS: &[&str] = &["drive.google.com", "sheets.google.com"];

/// Recognizes generic web pages; the normalized URL digest is the identity.
pub struct ArticleParser;

impl SourceParser for ArticleParser {
    fn source_type(&self) -> SourceType {
        SourceType::Article
    }

    fn recognize(&self, input: &str) -> bool {
        let Ok(url) = Url::parse(input.trim()) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        !CLOUD_STORAGE_HOSTS.contains(&host)
            && !is_video_platform_url(input)
            && !is_cloud_doc_url(input)
    }

    fn canonicalize(&self, input: &str) -> Result<SourceIdentity> {
        let (_, digest) = url_digest(input).map_err(|e| {
            SiphonError::canonicalization(SourceType::Article, input, e.to_string())
        })?;
        Ok(SourceIdentity {
            source_type: SourceType::Article,
            canonical_uri: format!("{}sha256/{digest}", SourceType::Article.uri_prefix()),
            original_input: input.to_string(),
            content_hash: Some(digest),
        })
    }
}

/// Extractor for `article` sources: fetch, isolate the readable body, convert
/// to Markdown.
pub struct ArticleExtractor {
    fetcher: Fetcher,
}

impl ArticleExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Extractor for ArticleExtractor {
    fn source_type(&self) -> SourceType {
        SourceType::Article
    }

    #[instrument(skip_all, fields(uri = %identity.canonical_uri))]
    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent> {
        let uri = &identity.canonical_uri;
        let url = normalize_url(&identity.original_input)
            .map_err(|e| SiphonError::extraction(uri, e.to_string()))?;
        let page = self.fetcher.fetch(&url).await?;

        let mut readable = None;
        let text = if page.is_html() {
            let found = extract_readable(&page.body);
            let body = if paragraph_count(&found.html) == 0 {
                debug!("no readable paragraphs, converting the whole page");
                page.body.as_str()
            } else {
                found.html.as_str()
            };
            let converted = siphon_markdown::convert(
                body,
                &ConvertOptions::with_base(page.final_url.clone()),
            )?;
            readable = Some((found, converted.title));
            converted.markdown
        } else {
            page.body.clone()
        };

        if text.trim().is_empty() {
            return Err(SiphonError::extraction(uri, "page has no readable text"));
        }
        debug!(chars = text.len(), html = readable.is_some(), "article extracted");

        let (found, heading) = readable.unwrap_or_default();
        let length = word_count(&text);

        let mut content = RawContent::new(SourceType::Article, text);
        let meta = &mut content.metadata;
        meta.insert("source_url".into(), url.to_string().into());
        meta.insert("final_url".into(), page.final_url.to_string().into());
        meta.insert("status_code".into(), page.status.into());
        meta.insert("content_type".into(), page.content_type.into());
        meta.insert("last_modified".into(), page.last_modified.into());
        meta.insert("title".into(), Value::from(found.title.or(heading)));
        meta.insert("byline".into(), found.byline.into());
        meta.insert("site_name".into(), found.site_name.into());
        meta.insert("lang".into(), found.lang.into());
        meta.insert("excerpt".into(), found.excerpt.into());
        meta.insert("length".into(), length.into());
        Ok(content)
    }
}
