//! In-process repository for tests and cache-less embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use siphon_shared::{ProcessedRecord, Result, now_epoch};
use tokio::sync::RwLock;

use crate::ContentRepository;

/// A [`ContentRepository`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<HashMap<String, ProcessedRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ContentRepository for MemoryRepository {
    async fn exists(&self, uri: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(uri))
    }

    async fn get(&self, uri: &str) -> Result<Option<ProcessedRecord>> {
        Ok(self.records.read().await.get(uri).cloned())
    }

    async fn set(&self, record: &ProcessedRecord) -> Result<ProcessedRecord> {
        let mut records = self.records.write().await;
        let mut stored = record.clone();
        if let Some(existing) = records.get(record.uri()) {
            stored.created_at = existing.created_at;
        }
        stored.updated_at = now_epoch().max(stored.created_at);
        records.insert(stored.uri().to_string(), stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use siphon_shared::{Enrichment, RawContent, SourceIdentity, SourceType};

    use super::*;

    fn record(uri: &str, text: &str) -> ProcessedRecord {
        let identity = SourceIdentity {
            source_type: SourceType::Article,
            canonical_uri: uri.into(),
            original_input: "https://example.com/".into(),
            content_hash: None,
        };
        ProcessedRecord::assemble(
            identity,
            RawContent::new(SourceType::Article, text),
            Enrichment::empty(SourceType::Article),
        )
    }

    #[tokio::test]
    async fn set_then_get() {
        let repo = MemoryRepository::new();
        assert!(!repo.exists("article:///sha256/a").await.unwrap());

        repo.set(&record("article:///sha256/a", "hello")).await.unwrap();
        assert!(repo.exists("article:///sha256/a").await.unwrap());
        let got = repo.get("article:///sha256/a").await.unwrap().unwrap();
        assert_eq!(got.text(), "hello");
        assert!(repo.get("article:///sha256/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_preserves_created_at() {
        let repo = MemoryRepository::new();
        let mut first = record("article:///sha256/a", "v1");
        first.created_at = 100;
        first.updated_at = 100;
        repo.set(&first).await.unwrap();

        let mut second = record("article:///sha256/a", "v2");
        second.created_at = 500;
        let stored = repo.set(&second).await.unwrap();

        assert_eq!(stored.created_at, 100);
        assert!(stored.updated_at >= 100);
        assert_eq!(stored.text(), "v2");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_to_distinct_keys() {
        let repo = Arc::new(MemoryRepository::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.set(&record(&format!("article:///sha256/{i}"), "x"))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(repo.len().await, 16);
    }
}
