//! Call-counting strategy and repository doubles for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use siphon_shared::{
    Enrichment, ProcessedRecord, RawContent, Result, SiphonError, SourceIdentity, SourceType,
};
use siphon_storage::{ContentRepository, MemoryRepository};

use crate::strategy::{Enricher, Extractor, SourceParser};

pub type Counter = Arc<AtomicUsize>;

pub fn count(counter: &Counter) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Claims inputs starting with `prefix`; the remainder becomes the URI path.
pub struct PrefixParser {
    source_type: SourceType,
    prefix: &'static str,
}

impl PrefixParser {
    pub fn new(source_type: SourceType, prefix: &'static str) -> Self {
        Self {
            source_type,
            prefix,
        }
    }
}

impl SourceParser for PrefixParser {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn recognize(&self, input: &str) -> bool {
        input.starts_with(self.prefix)
    }

    fn canonicalize(&self, input: &str) -> Result<SourceIdentity> {
        let rest = input.strip_prefix(self.prefix).unwrap_or_default();
        if rest.is_empty() {
            return Err(SiphonError::canonicalization(
                self.source_type,
                input,
                "nothing after prefix",
            ));
        }
        Ok(SourceIdentity {
            source_type: self.source_type,
            canonical_uri: format!("{}{rest}", self.source_type.uri_prefix()),
            original_input: input.to_string(),
            content_hash: None,
        })
    }
}

#[derive(Default, Clone)]
struct Behaviour {
    fail: bool,
    delay: Option<Duration>,
}

impl Behaviour {
    async fn run(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SiphonError::Network("upstream unavailable".into()));
        }
        Ok(())
    }
}

pub struct MockExtractor {
    source_type: SourceType,
    calls: Counter,
    behaviour: Behaviour,
}

impl MockExtractor {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            calls: Counter::default(),
            behaviour: Behaviour::default(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.behaviour.fail = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.behaviour.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Counter {
        self.calls.clone()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behaviour.run().await?;
        let mut content = RawContent::new(
            self.source_type,
            format!("content of {}", identity.canonical_uri),
        );
        content
            .metadata
            .insert("title".into(), identity.original_input.clone().into());
        Ok(content)
    }
}

pub struct MockEnricher {
    source_type: SourceType,
    calls: Counter,
    behaviour: Behaviour,
}

impl MockEnricher {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            calls: Counter::default(),
            behaviour: Behaviour::default(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.behaviour.fail = true;
        self
    }

    pub fn calls(&self) -> Counter {
        self.calls.clone()
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn enrich(&self, content: &RawContent) -> Result<Enrichment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behaviour.run().await?;
        Ok(Enrichment {
            title: content.meta_str("title").unwrap_or("untitled").to_string(),
            summary: format!("summary of {}", content.text),
            topics: vec!["testing".into()],
            ..Enrichment::empty(self.source_type)
        })
    }
}

/// [`MemoryRepository`] that counts calls, optionally failing every one.
#[derive(Default)]
pub struct CountingRepository {
    inner: MemoryRepository,
    pub exists_calls: Counter,
    pub get_calls: Counter,
    pub set_calls: Counter,
    broken: bool,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        count(&self.exists_calls) + count(&self.get_calls) + count(&self.set_calls)
    }

    fn check(&self) -> Result<()> {
        if self.broken {
            return Err(SiphonError::Storage("database is locked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for CountingRepository {
    async fn exists(&self, uri: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.exists(uri).await
    }

    async fn get(&self, uri: &str) -> Result<Option<ProcessedRecord>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(uri).await
    }

    async fn set(&self, record: &ProcessedRecord) -> Result<ProcessedRecord> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set(record).await
    }
}

/// A one-page PDF that shows `text` in Helvetica, with a correct xref table.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}
