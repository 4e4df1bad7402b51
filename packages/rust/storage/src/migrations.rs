//! SQL migration definitions for the Siphon database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: processed_content keyed by canonical URI",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per canonical URI
CREATE TABLE IF NOT EXISTS processed_content (
    uri              TEXT PRIMARY KEY,
    source_type      TEXT NOT NULL,
    original_input   TEXT NOT NULL,
    content_hash     TEXT,
    content_text     TEXT NOT NULL,
    content_metadata TEXT NOT NULL DEFAULT '{}',
    title            TEXT NOT NULL DEFAULT '',
    description      TEXT NOT NULL DEFAULT '',
    summary          TEXT NOT NULL DEFAULT '',
    topics           TEXT NOT NULL DEFAULT '[]',
    entities         TEXT NOT NULL DEFAULT '[]',
    tags             TEXT NOT NULL DEFAULT '[]',
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processed_source_type ON processed_content(source_type);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index processed_content by recency",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_processed_updated_at ON processed_content(updated_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

/// Highest version in [`all_migrations`].
#[cfg(test)]
pub(crate) fn latest_version() -> u32 {
    all_migrations().last().map(|m| m.version).unwrap_or(0)
}
