//! Application configuration for Siphon.
//!
//! User config lives at `~/.siphon/siphon.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiphonError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "siphon.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".siphon";

// ---------------------------------------------------------------------------
// Config structs (matching siphon.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings for LLM enrichment.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// HTTP fetch policy.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// External transcription commands.
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the libSQL database holding processed records.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Whether requests consult and populate the cache by default.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Per-stage deadline in seconds (0 disables).
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            use_cache: true,
            stage_timeout_secs: default_stage_timeout(),
        }
    }
}

fn default_database_path() -> String {
    "~/.siphon/siphon.db".into()
}
fn default_true() -> bool {
    true
}
fn default_stage_timeout() -> u64 {
    300
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for enrichment.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Content beyond this many characters is truncated before prompting.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "anthropic/claude-3.5-haiku".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_max_input_chars() -> usize {
    48_000
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Permit loopback and private-range hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_redirects: default_max_redirects(),
            allow_private_hosts: false,
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[transcription]` section.
///
/// Each command is an argv array. `{input}` is replaced with the file path
/// (audio) or the video URL, `{url}` with the canonical watch URL, and `{id}`
/// with the platform video ID. The command's stdout is the transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub audio_command: Vec<String>,

    #[serde(default)]
    pub video_command: Vec<String>,
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply `SIPHON_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `SIPHON_*` overrides using `lookup` as the environment.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("SIPHON_DEFAULT_MODEL").filter(|v| !v.is_empty()) {
            self.openrouter.default_model = model;
        }
        if let Some(cache) = lookup("SIPHON_CACHE") {
            self.defaults.use_cache =
                matches!(cache.to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(db) = lookup("SIPHON_DB").filter(|v| !v.is_empty()) {
            self.defaults.database_path = db;
        }
    }

    /// Database path with a leading `~` expanded to the home directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        expand_home(&self.defaults.database_path)
    }
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| SiphonError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.siphon/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiphonError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.siphon/siphon.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk, then apply environment overrides.
/// Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiphonError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SiphonError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiphonError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiphonError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiphonError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the configured env var, if set and non-empty.
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.openrouter.api_key_env)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.defaults.use_cache);
        assert_eq!(parsed.defaults.stage_timeout_secs, 300);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(parsed.fetch.max_redirects, 5);
    }

    #[test]
    fn config_with_transcription_commands() {
        let toml_str = r#"
[defaults]
use_cache = false

[transcription]
audio_command = ["whisper-cli", "--output-txt", "{input}"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(!config.defaults.use_cache);
        assert_eq!(config.transcription.audio_command.len(), 3);
        assert!(config.transcription.video_command.is_empty());
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| match key {
            "SIPHON_DEFAULT_MODEL" => Some("openai/gpt-4o-mini".into()),
            "SIPHON_CACHE" => Some("no".into()),
            "SIPHON_DB" => Some("/tmp/siphon-test.db".into()),
            _ => None,
        });
        assert_eq!(config.openrouter.default_model, "openai/gpt-4o-mini");
        assert!(!config.defaults.use_cache);
        assert_eq!(
            config.database_path().expect("db path"),
            PathBuf::from("/tmp/siphon-test.db")
        );
    }

    #[test]
    fn cache_override_accepts_truthy_values() {
        let mut config = AppConfig::default();
        config.defaults.use_cache = false;
        config.apply_overrides_from(|key| (key == "SIPHON_CACHE").then(|| "YES".into()));
        assert!(config.defaults.use_cache);
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "SIPHON_TEST_NONEXISTENT_KEY_12345".into();
        assert!(resolve_api_key(&config).is_none());
    }
}
