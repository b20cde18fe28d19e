//! Repository layer for tender and document persistence.
//!
//! The pipeline only talks to the [`TenderStore`] and [`DocumentStore`]
//! traits; [`SqliteRepository`] is the bundled implementation.

mod sqlite;

pub use sqlite::SqliteRepository;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::models::{ContentColumn, Document, NewDocument, Tender, UpsertedDocument};

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid stored JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Read and update tender rows.
#[async_trait]
pub trait TenderStore: Send + Sync {
    /// Load a tender with its link map and content columns.
    async fn get_tender(&self, id: i64) -> Result<Option<Tender>>;

    /// Write scraped content into one of the tender's content columns.
    /// Returns false when the tender does not exist.
    async fn write_content(&self, tender_id: i64, column: ContentColumn, value: &str)
        -> Result<bool>;
}

/// Read and update document rows.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Source URLs of the tender's download-kind documents.
    async fn downloaded_source_urls(&self, tender_id: i64) -> Result<HashSet<String>>;

    /// Insert a document, or refresh the stored file of the existing row with
    /// the same (tender, original file name).
    async fn upsert_document(&self, doc: &NewDocument) -> Result<UpsertedDocument>;

    /// Point every child at its archive. Returns the number of rows changed.
    async fn set_parent(&self, parent_id: i64, child_ids: &[i64]) -> Result<usize>;

    /// Count and total size of the tender's pending downloads.
    async fn count_pending(&self, tender_id: i64) -> Result<(u64, u64)>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;

    async fn list_for_tender(&self, tender_id: i64) -> Result<Vec<Document>>;

    /// Mark non-archive documents as queued. Returns the ids that changed.
    async fn mark_queued(&self, ids: &[i64]) -> Result<Vec<i64>>;
}

/// Open a connection with WAL journaling and foreign keys enabled.
pub fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    "#,
    )?;
    Ok(conn)
}

/// Convert a missing-row error into `None`.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
