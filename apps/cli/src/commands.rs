//! CLI command definitions, routing, and tracing setup.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use siphon_core::{Pipeline, ProcessOptions, ProgressReporter, SilentProgress, default_registry};
use siphon_shared::{
    Action, AppConfig, PipelineOutput, ProcessedRecord, SourceType, Stage, init_config,
    load_config,
};
use siphon_storage::{ContentRepository, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Siphon: turn URLs and local files into cached, enriched text records.
#[derive(Parser)]
#[command(
    name = "siphon",
    version,
    about = "Ingest web pages, videos, cloud documents, audio and local files into enriched text records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (overrides config and SIPHON_DB).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// How far to take a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ActionArg {
    Parse,
    Extract,
    Enrich,
    Gulp,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Parse => Action::Parse,
            ActionArg::Extract => Action::Extract,
            ActionArg::Enrich => Action::Enrich,
            ActionArg::Gulp => Action::Gulp,
        }
    }
}

/// What to print for a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReturnArg {
    Content,
    Summary,
    Uri,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process a URL or local file path.
    Process {
        /// URL or file path.
        source: String,

        /// Stop after this stage.
        #[arg(short, long, value_enum, default_value = "gulp")]
        action: ActionArg,

        /// Skip the cache lookup and do not store the result.
        #[arg(long)]
        no_cache: bool,

        /// Output: content, summary, uri or json.
        #[arg(short, long = "return", value_enum)]
        return_type: Option<ReturnArg>,

        /// Print the extracted text only.
        #[arg(long)]
        raw: bool,
    },

    /// Show the most recently processed record.
    Last {
        /// Print the extracted text only.
        #[arg(long)]
        raw: bool,
    },

    /// Show a stored record by canonical URI.
    Get {
        /// Canonical URI, e.g. `article:///sha256/<hash>`.
        uri: String,

        /// Output: content, summary, uri or json.
        #[arg(short, long = "return", value_enum)]
        return_type: Option<ReturnArg>,
    },

    /// List recently processed records.
    List {
        /// Maximum number of records.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// List the supported source types.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "siphon=info",
        1 => "siphon=debug",
        _ => "siphon=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Process {
            source,
            action,
            no_cache,
            return_type,
            raw,
        } => cmd_process(db, &source, action.into(), no_cache, return_type, raw).await,
        Command::Last { raw } => cmd_last(db, raw).await,
        Command::Get { uri, return_type } => cmd_get(db, &uri, return_type).await,
        Command::List { limit } => cmd_list(db, limit).await,
        Command::Sources => cmd_sources().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(db).await,
        },
    }
}

/// Loaded config with the `--db` flag applied on top.
fn resolve_config(db: Option<PathBuf>) -> Result<AppConfig> {
    let mut config = load_config()?;
    if let Some(db) = db {
        config.defaults.database_path = db.to_string_lossy().into_owned();
    }
    Ok(config)
}

async fn cmd_process(
    db: Option<PathBuf>,
    source: &str,
    action: Action,
    no_cache: bool,
    return_type: Option<ReturnArg>,
    raw: bool,
) -> Result<()> {
    let config = resolve_config(db)?;
    let opts = ProcessOptions::from_config(&config).with_cache(!no_cache && config.defaults.use_cache);

    let storage = Storage::open(&config.database_path()?).await?;
    let repository: Arc<dyn ContentRepository> = Arc::new(storage);
    let pipeline = Pipeline::new(Arc::new(default_registry(&config)?), repository);

    info!(source, ?action, use_cache = opts.use_cache, "processing source");

    let output = if std::io::stderr().is_terminal() {
        let reporter = CliProgress::new();
        let result = pipeline.process(source, action, &opts, &reporter).await;
        reporter.finish();
        result?
    } else {
        pipeline.process(source, action, &opts, &SilentProgress).await?
    };

    let return_type = if raw { Some(ReturnArg::Content) } else { return_type };
    println!("{}", render_output(&output, return_type)?);
    Ok(())
}

async fn cmd_last(db: Option<PathBuf>, raw: bool) -> Result<()> {
    let config = resolve_config(db)?;
    let storage = Storage::open_readonly(&config.database_path()?).await?;
    let record = storage
        .latest()
        .await?
        .ok_or_else(|| eyre!("no records yet; run `siphon process <SOURCE>` first"))?;

    let return_type = raw.then_some(ReturnArg::Content);
    println!("{}", render_record(&record, return_type)?);
    Ok(())
}

async fn cmd_get(db: Option<PathBuf>, uri: &str, return_type: Option<ReturnArg>) -> Result<()> {
    let config = resolve_config(db)?;
    let storage = Storage::open_readonly(&config.database_path()?).await?;
    let record = storage
        .get(uri)
        .await?
        .ok_or_else(|| eyre!("no record stored for '{uri}'"))?;

    println!("{}", render_record(&record, return_type)?);
    Ok(())
}

async fn cmd_list(db: Option<PathBuf>, limit: u32) -> Result<()> {
    let config = resolve_config(db)?;
    let storage = Storage::open_readonly(&config.database_path()?).await?;
    let records = storage.list(limit).await?;

    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    let total = storage.count().await?;
    for r in &records {
        let when = chrono::DateTime::from_timestamp(r.updated_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{when}  {:<15} {}  {}", r.source_type.as_str(), r.uri, r.title);
    }
    println!();
    println!("  {} of {total} record(s)", records.len());
    Ok(())
}

async fn cmd_sources() -> Result<()> {
    let config = load_config()?;
    let registry = default_registry(&config)?;
    for source_type in registry.registered_types() {
        println!("{:<15} {}", source_type.as_str(), source_type.uri_prefix());
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(db: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(db)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render a pipeline result for stdout.
fn render_output(output: &PipelineOutput, return_type: Option<ReturnArg>) -> Result<String> {
    if return_type == Some(ReturnArg::Json) {
        return Ok(serde_json::to_string_pretty(output)?);
    }
    Ok(match output {
        PipelineOutput::Record(record) => return render_record(record, return_type),
        PipelineOutput::Identity(identity) => identity.canonical_uri.clone(),
        PipelineOutput::Content(content) => content.text.clone(),
        PipelineOutput::Enrichment(enrichment) => match return_type {
            Some(ReturnArg::Summary) => enrichment.summary.clone(),
            _ => format!("# {}\n\n{}", enrichment.title, enrichment.summary),
        },
    })
}

/// Render a stored record; the default is `# <title>: <uri>` over the summary.
fn render_record(record: &ProcessedRecord, return_type: Option<ReturnArg>) -> Result<String> {
    Ok(match return_type {
        Some(ReturnArg::Content) => record.text().to_string(),
        Some(ReturnArg::Summary) => record.summary().to_string(),
        Some(ReturnArg::Uri) => record.uri().to_string(),
        Some(ReturnArg::Json) => serde_json::to_string_pretty(record)?,
        None => format!("# {}: {}\n\n{}", record.title(), record.uri(), record.summary()),
    })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage, target: &str) {
        let label = match stage {
            Stage::Parse => "Parsing",
            Stage::Extract => "Extracting",
            Stage::Enrich => "Enriching",
            Stage::Assemble => "Saving",
        };
        self.spinner.set_message(format!("{label} {target}"));
    }

    fn cache_hit(&self, uri: &str) {
        self.spinner.set_message(format!("Cached {uri}"));
    }

    fn done(&self, output: &PipelineOutput) {
        let kind: SourceType = output.source_type();
        self.spinner.set_message(format!("Done ({kind})"));
    }
}
