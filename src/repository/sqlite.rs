//! SQLite-backed tender and document repository.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use super::{
    parse_datetime, parse_datetime_opt, to_option, DocumentStore, Result, TenderStore,
};
use crate::models::{
    ContentColumn, Document, DocumentLinks, NewDocument, ProcessingStatus, SourceKind, Tender,
    UpsertedDocument,
};

/// Repository holding tenders and their documents in one SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    db_path: PathBuf,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tenders (
                id INTEGER PRIMARY KEY,
                title TEXT,
                external_id TEXT,
                document_links TEXT NOT NULL DEFAULT '{}',
                announcement_content TEXT,
                correction_notice_content TEXT,
                goods_services_content TEXT,
                zeyilname_content TEXT,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tender_id INTEGER NOT NULL REFERENCES tenders(id),
                filename TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL DEFAULT 0,
                storage_path TEXT,
                storage_url TEXT,
                source_url TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                source_type TEXT NOT NULL,
                is_extracted INTEGER NOT NULL DEFAULT 0,
                is_zip_parent INTEGER NOT NULL DEFAULT 0,
                parent_doc_id INTEGER REFERENCES documents(id),
                processing_status TEXT NOT NULL DEFAULT 'pending',
                content_text TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(tender_id, original_filename)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_tender ON documents(tender_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(processing_status);
            CREATE INDEX IF NOT EXISTS idx_documents_parent ON documents(parent_doc_id);
        "#,
        )?;
        Ok(())
    }

    /// Insert or replace a tender row with its link map.
    pub fn insert_tender(&self, tender: &Tender) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO tenders (
                id, title, external_id, document_links, announcement_content,
                correction_notice_content, goods_services_content, zeyilname_content, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                external_id = excluded.external_id,
                document_links = excluded.document_links,
                updated_at = excluded.updated_at
            "#,
            params![
                tender.id,
                tender.title,
                tender.external_id,
                serde_json::to_string(&tender.document_links)?,
                tender.announcement_content,
                tender.correction_notice_content,
                tender.goods_services_content,
                tender.zeyilname_content,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load a tender row.
    pub fn tender(&self, id: i64) -> Result<Option<Tender>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM tenders WHERE id = ?")?;
        let row = to_option(stmt.query_row(params![id], |row| {
            Ok((
                Tender {
                    id: row.get("id")?,
                    title: row.get("title")?,
                    external_id: row.get("external_id")?,
                    document_links: DocumentLinks::new(),
                    announcement_content: row.get("announcement_content")?,
                    correction_notice_content: row.get("correction_notice_content")?,
                    goods_services_content: row.get("goods_services_content")?,
                    zeyilname_content: row.get("zeyilname_content")?,
                    updated_at: parse_datetime_opt(row.get("updated_at")?),
                },
                row.get::<_, Option<String>>("document_links")?,
            ))
        }))?;

        let Some((mut tender, links)) = row else {
            return Ok(None);
        };
        if let Some(links) = links.filter(|l| !l.trim().is_empty()) {
            tender.document_links = serde_json::from_str(&links)?;
        }
        Ok(Some(tender))
    }

    /// Write one content column of a tender.
    pub fn update_content(&self, tender_id: i64, column: ContentColumn, value: &str) -> Result<bool> {
        let conn = self.connect()?;
        let sql = format!(
            "UPDATE tenders SET {} = ?1, updated_at = ?2 WHERE id = ?3",
            column.column_name()
        );
        let rows = conn.execute(&sql, params![value, Utc::now().to_rfc3339(), tender_id])?;
        Ok(rows > 0)
    }

    /// Source URLs already stored as downloads for a tender.
    pub fn download_source_urls(&self, tender_id: i64) -> Result<HashSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT source_url FROM documents WHERE tender_id = ? AND source_type = 'download'",
        )?;
        let urls = stmt
            .query_map(params![tender_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(urls)
    }

    /// Insert a document or refresh the file of its (tender, name) twin.
    pub fn upsert(&self, doc: &NewDocument) -> Result<UpsertedDocument> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM documents WHERE tender_id = ? AND original_filename = ?",
                params![doc.tender_id, doc.original_filename],
                |row| row.get(0),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        let (id, storage_path, storage_url): (i64, Option<String>, Option<String>) = tx.query_row(
            r#"
            INSERT INTO documents (
                tender_id, filename, original_filename, file_type, file_size,
                storage_path, storage_url, source_url, doc_type, source_type,
                is_extracted, is_zip_parent, processing_status, content_text,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
            ON CONFLICT(tender_id, original_filename) DO UPDATE SET
                storage_path = excluded.storage_path,
                storage_url = excluded.storage_url,
                file_size = excluded.file_size,
                is_zip_parent = excluded.is_zip_parent,
                content_text = COALESCE(excluded.content_text, documents.content_text),
                updated_at = excluded.updated_at
            RETURNING id, storage_path, storage_url
            "#,
            params![
                doc.tender_id,
                doc.filename,
                doc.original_filename,
                doc.file_type,
                doc.file_size as i64,
                doc.storage_path,
                doc.storage_url,
                doc.source_url,
                doc.doc_type,
                doc.source_kind.as_str(),
                doc.is_extracted,
                doc.is_zip_parent,
                doc.processing_status.as_str(),
                doc.content_text,
                now,
            ],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        tx.commit()?;

        if existing.is_some() {
            warn!(
                "Document already existed and was updated: {}",
                doc.original_filename
            );
        }
        debug!(
            "Stored document id={} path={:?}",
            id,
            storage_path.as_deref().unwrap_or("NULL")
        );

        Ok(UpsertedDocument {
            id,
            storage_path,
            storage_url,
            is_new: existing.is_none(),
        })
    }

    /// Set `parent_doc_id` on every child.
    pub fn update_parent(&self, parent_id: i64, child_ids: &[i64]) -> Result<usize> {
        if child_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.connect()?;
        let sql = format!(
            "UPDATE documents SET parent_doc_id = ?, updated_at = ? WHERE id IN ({})",
            placeholders(child_ids.len())
        );
        let now = Utc::now().to_rfc3339();
        let mut values: Vec<rusqlite::types::Value> =
            vec![parent_id.into(), rusqlite::types::Value::Text(now)];
        values.extend(child_ids.iter().map(|id| rusqlite::types::Value::from(*id)));
        Ok(conn.execute(&sql, params_from_iter(values))?)
    }

    /// Count and total size of pending downloads.
    pub fn pending_downloads(&self, tender_id: i64) -> Result<(u64, u64)> {
        let conn = self.connect()?;
        let (count, total): (i64, Option<i64>) = conn.query_row(
            r#"
            SELECT COUNT(*), SUM(file_size) FROM documents
            WHERE tender_id = ? AND source_type = 'download' AND processing_status = 'pending'
            "#,
            params![tender_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count.max(0) as u64, total.unwrap_or(0).max(0) as u64))
    }

    pub fn document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM documents WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_document))
    }

    /// Documents of a tender, grouped the way reviewers read them.
    pub fn documents_for_tender(&self, tender_id: i64) -> Result<Vec<Document>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM documents WHERE tender_id = ?
            ORDER BY source_type, doc_type, is_extracted, created_at, id
            "#,
        )?;
        let docs = stmt
            .query_map(params![tender_id], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Queue documents for analysis, never touching archives.
    pub fn queue_documents(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connect()?;
        let sql = format!(
            r#"
            UPDATE documents SET processing_status = 'queued', updated_at = ?
            WHERE id IN ({})
              AND LOWER(LTRIM(file_type, '.')) NOT IN ('zip', 'rar')
            RETURNING id
            "#,
            placeholders(ids.len())
        );
        let mut values: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Text(Utc::now().to_rfc3339())];
        values.extend(ids.iter().map(|id| rusqlite::types::Value::from(*id)));

        let mut stmt = conn.prepare(&sql)?;
        let mut queued = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        queued.sort_unstable();
        Ok(queued)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        tender_id: row.get("tender_id")?,
        filename: row.get("filename")?,
        original_filename: row.get("original_filename")?,
        file_type: row.get("file_type")?,
        file_size: row.get::<_, i64>("file_size")?.max(0) as u64,
        storage_path: row.get("storage_path")?,
        storage_url: row.get("storage_url")?,
        source_url: row.get("source_url")?,
        doc_type: row.get("doc_type")?,
        source_kind: SourceKind::from_str(&row.get::<_, String>("source_type")?)
            .unwrap_or(SourceKind::Download),
        is_extracted: row.get("is_extracted")?,
        is_zip_parent: row.get("is_zip_parent")?,
        parent_doc_id: row.get("parent_doc_id")?,
        processing_status: ProcessingStatus::from_str(
            &row.get::<_, String>("processing_status")?,
        )
        .unwrap_or(ProcessingStatus::Pending),
        content_text: row.get("content_text")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

#[async_trait]
impl TenderStore for SqliteRepository {
    async fn get_tender(&self, id: i64) -> Result<Option<Tender>> {
        self.tender(id)
    }

    async fn write_content(
        &self,
        tender_id: i64,
        column: ContentColumn,
        value: &str,
    ) -> Result<bool> {
        self.update_content(tender_id, column, value)
    }
}

#[async_trait]
impl DocumentStore for SqliteRepository {
    async fn downloaded_source_urls(&self, tender_id: i64) -> Result<HashSet<String>> {
        self.download_source_urls(tender_id)
    }

    async fn upsert_document(&self, doc: &NewDocument) -> Result<UpsertedDocument> {
        self.upsert(doc)
    }

    async fn set_parent(&self, parent_id: i64, child_ids: &[i64]) -> Result<usize> {
        self.update_parent(parent_id, child_ids)
    }

    async fn count_pending(&self, tender_id: i64) -> Result<(u64, u64)> {
        self.pending_downloads(tender_id)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        self.document(id)
    }

    async fn list_for_tender(&self, tender_id: i64) -> Result<Vec<Document>> {
        self.documents_for_tender(tender_id)
    }

    async fn mark_queued(&self, ids: &[i64]) -> Result<Vec<i64>> {
        self.queue_documents(ids)
    }
}
