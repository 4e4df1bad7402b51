//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding one
//! [`ProcessedRecord`] per canonical URI. It implements [`ContentRepository`],
//! the three-operation contract the pipeline caches through;
//! [`MemoryRepository`] is the in-process alternative.
//!
//! **Access rules:**
//! - `siphon process`: read-write via [`Storage::open`]
//! - `siphon last|get|list`: read-only via [`Storage::open_readonly`]

mod memory;
mod migrations;
mod repository;

use std::path::Path;

use async_trait::async_trait;
use libsql::{Connection, Database, params};
use siphon_shared::{
    Enrichment, ProcessedRecord, RawContent, Result, SiphonError, SourceIdentity, SourceType,
    now_epoch,
};

pub use memory::MemoryRepository;
pub use repository::ContentRepository;

/// Columns read by every record query, in [`row_to_record`] order.
const RECORD_COLUMNS: &str = "uri, source_type, original_input, content_hash, content_text, \
     content_metadata, title, description, summary, topics, entities, tags, created_at, updated_at";

fn storage_err(e: impl std::fmt::Display) -> SiphonError {
    SiphonError::Storage(e.to_string())
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SiphonError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SiphonError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SiphonError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SiphonError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Record operations
    // -----------------------------------------------------------------------

    /// Upsert `record`, keeping `created_at` of an existing row.
    async fn upsert_record(&self, record: &ProcessedRecord) -> Result<()> {
        self.check_writable()?;

        let metadata = serde_json::to_string(&record.content.metadata).map_err(storage_err)?;
        let topics = serde_json::to_string(&record.enrichment.topics).map_err(storage_err)?;
        let entities = serde_json::to_string(&record.enrichment.entities).map_err(storage_err)?;
        let tags = serde_json::to_string(&record.tags).map_err(storage_err)?;
        let updated_at = now_epoch().max(record.created_at);

        self.conn
            .execute(
                "INSERT INTO processed_content (uri, source_type, original_input, content_hash,
                   content_text, content_metadata, title, description, summary, topics, entities,
                   tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(uri) DO UPDATE SET
                   source_type = excluded.source_type,
                   original_input = excluded.original_input,
                   content_hash = excluded.content_hash,
                   content_text = excluded.content_text,
                   content_metadata = excluded.content_metadata,
                   title = excluded.title,
                   description = excluded.description,
                   summary = excluded.summary,
                   topics = excluded.topics,
                   entities = excluded.entities,
                   tags = excluded.tags,
                   updated_at = excluded.updated_at",
                params![
                    record.uri(),
                    record.identity.source_type.as_str(),
                    record.identity.original_input.as_str(),
                    record.identity.content_hash.as_deref(),
                    record.content.text.as_str(),
                    metadata.as_str(),
                    record.enrichment.title.as_str(),
                    record.enrichment.description.as_str(),
                    record.enrichment.summary.as_str(),
                    topics.as_str(),
                    entities.as_str(),
                    tags.as_str(),
                    record.created_at,
                    updated_at,
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Fetch a single record by canonical URI.
    async fn fetch_record(&self, uri: &str) -> Result<Option<ProcessedRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM processed_content WHERE uri = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![uri])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// The most recently updated record, if any.
    pub async fn latest(&self) -> Result<Option<ProcessedRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM processed_content
             ORDER BY updated_at DESC, rowid DESC LIMIT 1"
        );
        let mut rows = self.conn.query(&sql, params![]).await.map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Summaries of the most recently updated records, newest first.
    pub async fn list(&self, limit: u32) -> Result<Vec<RecordSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT uri, source_type, title, updated_at FROM processed_content
                 ORDER BY updated_at DESC, rowid DESC
                 LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(RecordSummary {
                uri: row.get::<String>(0).map_err(storage_err)?,
                source_type: parse_source_type(&row.get::<String>(1).map_err(storage_err)?)?,
                title: row.get::<String>(2).unwrap_or_default(),
                updated_at: row.get::<i64>(3).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM processed_content", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map(|n| n.max(0) as u64).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }
}

#[async_trait]
impl ContentRepository for Storage {
    async fn exists(&self, uri: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM processed_content WHERE uri = ?1",
                params![uri],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn get(&self, uri: &str) -> Result<Option<ProcessedRecord>> {
        self.fetch_record(uri).await
    }

    #[tracing::instrument(skip_all, fields(uri = %record.uri()))]
    async fn set(&self, record: &ProcessedRecord) -> Result<ProcessedRecord> {
        self.upsert_record(record).await?;
        tracing::debug!("record stored");
        self.fetch_record(record.uri()).await?.ok_or_else(|| {
            SiphonError::Storage(format!("record {} missing after write", record.uri()))
        })
    }
}

/// One line of `siphon list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub uri: String,
    pub source_type: SourceType,
    pub title: String,
    /// Epoch seconds.
    pub updated_at: i64,
}

fn parse_source_type(s: &str) -> Result<SourceType> {
    s.parse::<SourceType>().map_err(SiphonError::Storage)
}

fn parse_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| SiphonError::Storage(format!("invalid {column} JSON: {e}")))
}

/// Convert a database row (selected with [`RECORD_COLUMNS`]) to a [`ProcessedRecord`].
fn row_to_record(row: &libsql::Row) -> Result<ProcessedRecord> {
    let source_type = parse_source_type(&row.get::<String>(1).map_err(storage_err)?)?;

    let identity = SourceIdentity {
        source_type,
        canonical_uri: row.get::<String>(0).map_err(storage_err)?,
        original_input: row.get::<String>(2).map_err(storage_err)?,
        content_hash: row.get::<String>(3).ok(),
    };

    let content = RawContent {
        source_type,
        text: row.get::<String>(4).map_err(storage_err)?,
        metadata: parse_json("content_metadata", &row.get::<String>(5).map_err(storage_err)?)?,
    };

    let enrichment = Enrichment {
        source_type,
        title: row.get::<String>(6).unwrap_or_default(),
        description: row.get::<String>(7).unwrap_or_default(),
        summary: row.get::<String>(8).unwrap_or_default(),
        topics: parse_json("topics", &row.get::<String>(9).map_err(storage_err)?)?,
        entities: parse_json("entities", &row.get::<String>(10).map_err(storage_err)?)?,
    };

    Ok(ProcessedRecord {
        identity,
        content,
        enrichment,
        tags: parse_json("tags", &row.get::<String>(11).map_err(storage_err)?)?,
        created_at: row.get::<i64>(12).map_err(storage_err)?,
        updated_at: row.get::<i64>(13).map_err(storage_err)?,
    })
}
