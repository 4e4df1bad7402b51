//! End-to-end pipeline orchestration.
//!
//! A run walks `Parse -> Extract -> Enrich -> Assemble`, returning at the
//! stage the caller's [`Action`] names. Before the expensive stages the
//! repository is consulted by canonical URI; a hit is projected to the
//! requested action and no extractor or enricher runs. Only a fully
//! assembled record is ever written, and only when caching is enabled.
//!
//! Two concurrent `Gulp` runs for the same URI may both miss and both write;
//! the repository keeps whichever write lands last.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use siphon_shared::{
    Action, AppConfig, Enrichment, PipelineOutput, ProcessedRecord, RawContent, Result,
    SiphonError, SourceIdentity, SourceType, Stage,
};
use siphon_storage::ContentRepository;

use crate::registry::StrategyRegistry;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-request settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Consult the repository before extracting and write the assembled record.
    pub use_cache: bool,
    /// Deadline applied to each of the extract and enrich stages.
    pub stage_timeout: Option<Duration>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            stage_timeout: None,
        }
    }
}

impl ProcessOptions {
    /// Options from the `[defaults]` config section; a zero timeout disables it.
    pub fn from_config(config: &AppConfig) -> Self {
        let secs = config.defaults.stage_timeout_secs;
        Self {
            use_cache: config.defaults.use_cache,
            stage_timeout: (secs > 0).then(|| Duration::from_secs(secs)),
        }
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for pipeline runs.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage. `target` is the raw input for `Parse`
    /// and the canonical URI afterwards.
    fn stage(&self, stage: Stage, target: &str);
    /// The repository already held a record for `uri`.
    fn cache_hit(&self, uri: &str);
    /// The run produced its output.
    fn done(&self, output: &PipelineOutput);
}

/// No-op progress reporter for headless/test use.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage, _target: &str) {}
    fn cache_hit(&self, _uri: &str) {}
    fn done(&self, _output: &PipelineOutput) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The orchestrator: a validated registry plus the repository it caches through.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<StrategyRegistry>,
    repository: Arc<dyn ContentRepository>,
}

impl Pipeline {
    pub fn new(registry: Arc<StrategyRegistry>, repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Supported source types, in recognition order.
    pub fn registered_types(&self) -> &[SourceType] {
        self.registry.registered_types()
    }

    /// Run `source` through the stages `action` requires.
    #[instrument(skip_all, fields(source = %source, ?action, use_cache = opts.use_cache))]
    pub async fn process(
        &self,
        source: &str,
        action: Action,
        opts: &ProcessOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        let start = Instant::now();
        let output = match self.run(source, action, opts, progress).await {
            Ok(output) => output,
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "pipeline failed");
                return Err(e);
            }
        };

        progress.done(&output);
        info!(
            source_type = %output.source_type(),
            stage = %action.terminal_stage(),
            elapsed_ms = start.elapsed().as_millis(),
            "pipeline complete"
        );
        Ok(output)
    }

    /// Canonical identity of `source`. Never touches the repository.
    pub fn parse(&self, source: &str) -> Result<SourceIdentity> {
        self.registry.canonicalize(source)
    }

    pub async fn extract(&self, source: &str, opts: &ProcessOptions) -> Result<RawContent> {
        self.run(source, Action::Extract, opts, &SilentProgress)
            .await?
            .into_content()
            .ok_or_else(|| unexpected_output(Action::Extract))
    }

    pub async fn enrich(&self, source: &str, opts: &ProcessOptions) -> Result<Enrichment> {
        self.run(source, Action::Enrich, opts, &SilentProgress)
            .await?
            .into_enrichment()
            .ok_or_else(|| unexpected_output(Action::Enrich))
    }

    pub async fn gulp(&self, source: &str, opts: &ProcessOptions) -> Result<ProcessedRecord> {
        self.run(source, Action::Gulp, opts, &SilentProgress)
            .await?
            .into_record()
            .ok_or_else(|| unexpected_output(Action::Gulp))
    }

    async fn run(
        &self,
        source: &str,
        action: Action,
        opts: &ProcessOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        // --- Parse ---
        progress.stage(Stage::Parse, source);
        let identity = self.parse(source)?;
        info!(
            uri = %identity.canonical_uri,
            source_type = %identity.source_type,
            "source identified"
        );
        if action == Action::Parse {
            return Ok(PipelineOutput::Identity(identity));
        }

        // --- Cache ---
        if opts.use_cache {
            if let Some(record) = self.cached(&identity.canonical_uri).await? {
                info!(uri = %identity.canonical_uri, "cache hit");
                progress.cache_hit(&identity.canonical_uri);
                return Ok(match action {
                    Action::Extract => PipelineOutput::Content(record.content),
                    Action::Enrich => PipelineOutput::Enrichment(record.enrichment),
                    _ => PipelineOutput::Record(record),
                });
            }
            debug!(uri = %identity.canonical_uri, "cache miss");
        }

        let uri = identity.canonical_uri.clone();
        let source_type = identity.source_type;

        // --- Extract ---
        progress.stage(Stage::Extract, &uri);
        let extractor = self.registry.extractor_for(source_type)?;
        let content = run_stage(
            Stage::Extract,
            &uri,
            opts.stage_timeout,
            extractor.extract(&identity),
        )
        .await?;
        if content.source_type != source_type {
            return Err(SiphonError::extraction(
                &uri,
                format!("extractor produced {} content", content.source_type),
            ));
        }
        info!(uri = %uri, chars = content.text.len(), "content extracted");
        if action == Action::Extract {
            return Ok(PipelineOutput::Content(content));
        }

        // --- Enrich ---
        progress.stage(Stage::Enrich, &uri);
        let enricher = self.registry.enricher_for(source_type)?;
        let enrichment = run_stage(
            Stage::Enrich,
            &uri,
            opts.stage_timeout,
            enricher.enrich(&content),
        )
        .await?;
        if enrichment.source_type != source_type {
            return Err(SiphonError::enrichment(
                &uri,
                format!("enricher produced {} enrichment", enrichment.source_type),
            ));
        }
        info!(uri = %uri, title = %enrichment.title, "content enriched");
        if action == Action::Enrich {
            return Ok(PipelineOutput::Enrichment(enrichment));
        }

        // --- Assemble ---
        progress.stage(Stage::Assemble, &uri);
        let record = ProcessedRecord::assemble(identity, content, enrichment);
        let record = if opts.use_cache {
            let stored = self.repository.set(&record).await?;
            debug!(uri = %uri, "record written through");
            stored
        } else {
            record
        };

        Ok(PipelineOutput::Record(record))
    }

    /// The stored record for `uri`, if the repository has one.
    async fn cached(&self, uri: &str) -> Result<Option<ProcessedRecord>> {
        if !self.repository.exists(uri).await? {
            return Ok(None);
        }
        self.repository.get(uri).await
    }
}

/// Await one stage under the optional deadline, tagging failures with the stage.
async fn run_stage<T>(
    stage: Stage,
    uri: &str,
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SiphonError::Timeout {
                stage,
                uri: uri.to_string(),
                secs: limit.as_secs(),
            })?,
        None => fut.await,
    };
    result.map_err(|e| e.in_stage(stage, uri))
}

fn unexpected_output(action: Action) -> SiphonError {
    SiphonError::Conversion(format!("pipeline returned the wrong output for {action:?}"))
}
