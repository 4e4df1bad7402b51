//! Video platform sources.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use siphon_canonical::{is_video_platform_url, video_id};
use siphon_fetch::Fetcher;
use siphon_shared::{RawContent, Result, SiphonError, SourceIdentity, SourceType};

use super::command;
use crate::strategy::{Extractor, SourceParser};

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// Recognizes video-platform URLs; the video ID is the identity.
pub struct VideoParser;

impl SourceParser for VideoParser {
    fn source_type(&self) -> SourceType {
        SourceType::VideoPlatform
    }

    fn recognize(&self, input: &str) -> bool {
        is_video_platform_url(input)
    }

    fn canonicalize(&self, input: &str) -> Result<SourceIdentity> {
        let id = video_id(input).map_err(|e| {
            SiphonError::canonicalization(SourceType::VideoPlatform, input, e.to_string())
        })?;
        Ok(SourceIdentity {
            source_type: SourceType::VideoPlatform,
            canonical_uri: format!("{}{id}", SourceType::VideoPlatform.uri_prefix()),
            original_input: input.to_string(),
            content_hash: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
}

/// Extractor for `video-platform` sources: oEmbed metadata plus a transcript
/// from `video_command` (`{input}`, `{url}` and `{id}` placeholders).
pub struct VideoExtractor {
    fetcher: Fetcher,
    command: Vec<String>,
    oembed_endpoint: String,
}

impl VideoExtractor {
    pub fn new(fetcher: Fetcher, command: Vec<String>) -> Self {
        Self {
            fetcher,
            command,
            oembed_endpoint: OEMBED_ENDPOINT.into(),
        }
    }

    /// Use a different oEmbed endpoint.
    pub fn with_oembed_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.oembed_endpoint = endpoint.into();
        self
    }

    async fn oembed(&self, watch_url: &str) -> Result<OEmbed> {
        let url = Url::parse_with_params(
            &self.oembed_endpoint,
            &[("url", watch_url), ("format", "json")],
        )
        .map_err(|e| SiphonError::config(format!("invalid oEmbed endpoint: {e}")))?;
        self.fetcher.fetch_json(&url).await
    }
}

#[async_trait]
impl Extractor for VideoExtractor {
    fn source_type(&self) -> SourceType {
        SourceType::VideoPlatform
    }

    #[instrument(skip_all, fields(uri = %identity.canonical_uri))]
    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent> {
        let uri = &identity.canonical_uri;
        let id = uri
            .strip_prefix(&SourceType::VideoPlatform.uri_prefix())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SiphonError::extraction(uri, "canonical URI carries no video id"))?
            .to_string();
        if self.command.is_empty() {
            return Err(SiphonError::extraction(
                uri,
                "no transcription.video_command configured",
            ));
        }

        let watch = watch_url(&id);
        let oembed = match self.oembed(&watch).await {
            Ok(o) => Some(o),
            Err(e) => {
                warn!(error = %e, "oEmbed lookup failed, continuing without metadata");
                None
            }
        };

        let argv = command::substitute(
            &self.command,
            &[
                ("input", identity.original_input.as_str()),
                ("url", watch.as_str()),
                ("id", id.as_str()),
            ],
        );
        info!(video_id = %id, "fetching transcript");
        let transcript = command::run(&argv).await?;
        if transcript.is_empty() {
            return Err(SiphonError::extraction(uri, "transcript is empty"));
        }

        let (title, channel) = oembed
            .map(|o| (o.title, o.author_name))
            .unwrap_or_default();

        let mut content = RawContent::new(SourceType::VideoPlatform, transcript);
        let meta = &mut content.metadata;
        meta.insert("title".into(), title.into());
        meta.insert("channel".into(), channel.into());
        meta.insert("url".into(), watch.into());
        meta.insert("video_id".into(), id.into());
        meta.insert("domain".into(), "youtube.com".into());
        Ok(content)
    }
}
