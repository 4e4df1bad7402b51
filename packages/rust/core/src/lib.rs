//! Source pipeline orchestration for Siphon.
//!
//! A source string (URL or local path) is recognized by a [`SourceParser`],
//! canonicalized into a [`SourceIdentity`](siphon_shared::SourceIdentity),
//! extracted into raw content, enriched, and assembled into a
//! [`ProcessedRecord`](siphon_shared::ProcessedRecord) that is cached by
//! canonical URI. [`Pipeline`] drives the stages; [`StrategyRegistry`] maps
//! each source type to its strategies.

pub mod enrichment;
pub mod pipeline;
pub mod registry;
pub mod sources;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use enrichment::{ExtractiveEnricher, LlmClient, LlmEnricher, OpenRouterClient};
pub use pipeline::{Pipeline, ProcessOptions, ProgressReporter, SilentProgress};
pub use registry::{Registration, RegistryBuilder, StrategyRegistry};
pub use sources::default_registry;
pub use strategy::{Enricher, Extractor, SourceParser};
