//! Shared types, error model, and configuration for Siphon.
//!
//! This crate is the foundation depended on by all other Siphon crates.
//! It provides:
//! - [`SiphonError`]: the unified error type and its [`FailureKind`] tag
//! - Domain types ([`SourceIdentity`], [`RawContent`], [`Enrichment`], [`ProcessedRecord`])
//! - Configuration ([`AppConfig`], config loading)
//! - File-type tables ([`file_types`])

pub mod config;
pub mod error;
pub mod file_types;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, OpenRouterConfig, TranscriptionConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{FailureKind, Result, SiphonError};
pub use types::{
    Action, Enrichment, Metadata, PipelineOutput, ProcessedRecord, RawContent, SourceIdentity,
    SourceType, Stage, now_epoch,
};
