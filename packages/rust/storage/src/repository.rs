//! The content repository contract the pipeline caches through.

use async_trait::async_trait;
use siphon_shared::{ProcessedRecord, Result};

/// Keyed store of assembled records, addressed by canonical URI.
///
/// `set` is an upsert: it creates the record when absent and otherwise
/// overwrites it, keeping the stored `created_at` and refreshing
/// `updated_at`. It returns the record as stored. Concurrent writes to the
/// same key resolve as last write wins.
///
/// Errors are real failures (connectivity, corrupt rows); a missing record is
/// `Ok(false)` / `Ok(None)`, never an error.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn exists(&self, uri: &str) -> Result<bool>;

    async fn get(&self, uri: &str) -> Result<Option<ProcessedRecord>>;

    async fn set(&self, record: &ProcessedRecord) -> Result<ProcessedRecord>;
}
