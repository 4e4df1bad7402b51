//! Built-in strategies for the five source types.
//!
//! Registration order is recognition order: the platform-specific URL
//! parsers come before the generic article parser, and the file parsers
//! only ever match existing paths.

pub mod article;
pub mod audio;
pub mod cloud_doc;
pub(crate) mod command;
pub mod doc;
pub mod file;
pub mod video;

use std::sync::Arc;

use tracing::info;

use siphon_fetch::Fetcher;
use siphon_shared::{AppConfig, Result, SourceType};

use crate::enrichment::{ExtractiveEnricher, LlmClient, LlmEnricher, OpenRouterClient};
use crate::registry::{Registration, StrategyRegistry};
use crate::strategy::Enricher;

pub use article::{ArticleExtractor, ArticleParser};
pub use audio::AudioExtractor;
pub use cloud_doc::{CloudDocExtractor, CloudDocParser};
pub use doc::DocExtractor;
pub use file::FileParser;
pub use video::{VideoExtractor, VideoParser};

/// Build the registry with every built-in strategy, configured from `config`.
///
/// Enrichment goes through OpenRouter when its API key is available and
/// falls back to local extractive enrichment otherwise.
pub fn default_registry(config: &AppConfig) -> Result<StrategyRegistry> {
    let fetcher = Fetcher::new(&config.fetch)?;
    let llm: Option<Arc<dyn LlmClient>> = match OpenRouterClient::from_config(config)? {
        Some(client) => Some(Arc::new(client)),
        None => {
            info!(
                env = %config.openrouter.api_key_env,
                "no OpenRouter API key, using extractive enrichment"
            );
            None
        }
    };
    let max_input_chars = config.openrouter.max_input_chars;
    let enricher = |source_type: SourceType| -> Box<dyn Enricher> {
        match &llm {
            Some(client) => Box::new(LlmEnricher::new(
                source_type,
                Arc::clone(client),
                max_input_chars,
            )),
            None => Box::new(ExtractiveEnricher::new(source_type)),
        }
    };

    let transcription = &config.transcription;
    StrategyRegistry::builder()
        .add(
            Registration::new(SourceType::VideoPlatform)
                .parser(VideoParser)
                .extractor(VideoExtractor::new(
                    fetcher.clone(),
                    transcription.video_command.clone(),
                ))
                .boxed_enricher(enricher(SourceType::VideoPlatform)),
        )
        .add(
            Registration::new(SourceType::CloudDoc)
                .parser(CloudDocParser)
                .extractor(CloudDocExtractor::new(fetcher.clone()))
                .boxed_enricher(enricher(SourceType::CloudDoc)),
        )
        .add(
            Registration::new(SourceType::Article)
                .parser(ArticleParser)
                .extractor(ArticleExtractor::new(fetcher))
                .boxed_enricher(enricher(SourceType::Article)),
        )
        .add(
            Registration::new(SourceType::FileAudio)
                .parser(FileParser::audio())
                .extractor(AudioExtractor::new(transcription.audio_command.clone()))
                .boxed_enricher(enricher(SourceType::FileAudio)),
        )
        .add(
            Registration::new(SourceType::FileDoc)
                .parser(FileParser::documents())
                .extractor(DocExtractor)
                .boxed_enricher(enricher(SourceType::FileDoc)),
        )
        .build()
}
