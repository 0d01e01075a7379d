//! Namespace registry: a local SQLite record of which namespaces this
//! deployment has populated, and which sources live in each.
//!
//! Remote index stats are eventually consistent, so "does this namespace
//! already hold data?" cannot be answered by polling the store right
//! after a write. The registry answers it exactly: a namespace is marked
//! populated on its first successful ingestion and stays marked until
//! `clear`. Ingestion consults the flag to decide whether a
//! supersede-delete is needed before inserting.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// One ingested source within a namespace.
#[derive(Debug)]
pub struct SourceEntry {
    pub source_slug: String,
    pub chunk_count: i64,
    pub ingested_at: i64,
}

pub struct NamespaceRegistry {
    pool: SqlitePool,
}

impl NamespaceRegistry {
    /// Open (creating if needed) the registry database at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open registry at {}", path.display()))?;

        let registry = Self { pool };
        registry.migrate().await?;
        Ok(registry)
    }

    /// Create tables if they do not exist. Safe to run on every startup.
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS namespaces (
                namespace           TEXT PRIMARY KEY,
                first_populated_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                namespace    TEXT NOT NULL,
                source_slug  TEXT NOT NULL,
                chunk_count  INTEGER NOT NULL,
                ingested_at  INTEGER NOT NULL,
                PRIMARY KEY (namespace, source_slug)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether this deployment has ever successfully written to the
    /// namespace.
    pub async fn is_populated(&self, namespace: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM namespaces WHERE namespace = ?")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Mark a namespace populated. Idempotent.
    pub async fn mark_populated(&self, namespace: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO namespaces (namespace, first_populated_at) VALUES (?, ?)",
        )
        .bind(namespace)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record (or refresh) a source's chunk count within a namespace.
    pub async fn record_source(
        &self,
        namespace: &str,
        source_slug: &str,
        chunk_count: usize,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (namespace, source_slug, chunk_count, ingested_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (namespace, source_slug)
            DO UPDATE SET chunk_count = excluded.chunk_count,
                          ingested_at = excluded.ingested_at
            "#,
        )
        .bind(namespace)
        .bind(source_slug)
        .bind(chunk_count as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sources recorded for a namespace, alphabetical by slug.
    pub async fn sources(&self, namespace: &str) -> Result<Vec<SourceEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT source_slug, chunk_count, ingested_at
            FROM sources WHERE namespace = ? ORDER BY source_slug
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SourceEntry {
                source_slug: row.get("source_slug"),
                chunk_count: row.get("chunk_count"),
                ingested_at: row.get("ingested_at"),
            })
            .collect())
    }

    /// All namespaces this deployment has populated.
    pub async fn namespaces(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT namespace FROM namespaces ORDER BY namespace")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("namespace")).collect())
    }

    /// Drop all record of a namespace (after the store itself is cleared).
    pub async fn forget_namespace(&self, namespace: &str) -> Result<()> {
        sqlx::query("DELETE FROM sources WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM namespaces WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
